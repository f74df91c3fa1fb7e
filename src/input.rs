//! Editing rules for the expression buffer.
//!
//! Every function takes the current buffer and returns the next one; the
//! buffer is never empty and collapses to `"0"`.

/// One key press as the button grid sends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A run of digits: `"7"`, `"0"`, `"00"`, `"000"`.
    Digits(String),
    Dot,
    /// One of `+ - × ÷`.
    Operator(char),
    Percent,
    Open,
    Close,
    /// A previous result inserted through the answer key.
    Answer(String),
}

impl Token {
    /// Parse a button value. `*`, `/`, `x` are accepted as aliases for the glyphs.
    pub fn parse(text: &str) -> Option<Token> {
        match text {
            "." => Some(Token::Dot),
            "+" | "-" => text.chars().next().map(Token::Operator),
            "×" | "*" | "x" | "X" => Some(Token::Operator('×')),
            "÷" | "/" => Some(Token::Operator('÷')),
            "%" => Some(Token::Percent),
            "(" => Some(Token::Open),
            ")" => Some(Token::Close),
            digits if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
                Some(Token::Digits(digits.to_string()))
            }
            _ => None,
        }
    }

    pub fn text(&self) -> String {
        match self {
            Token::Digits(d) | Token::Answer(d) => d.clone(),
            Token::Dot => ".".to_string(),
            Token::Operator(op) => op.to_string(),
            Token::Percent => "%".to_string(),
            Token::Open => "(".to_string(),
            Token::Close => ")".to_string(),
        }
    }

    fn is_zeros(&self) -> bool {
        matches!(self, Token::Digits(d) if d.chars().all(|c| c == '0'))
    }

    /// Tokens that cannot begin an expression.
    fn needs_left_operand(&self) -> bool {
        matches!(self, Token::Operator(_) | Token::Percent | Token::Close)
    }
}

pub fn is_operator(c: char) -> bool {
    matches!(c, '+' | '-' | '×' | '÷')
}

/// The number being typed at the end of the buffer (digits and dots only).
fn trailing_number(buffer: &str) -> &str {
    let start = buffer
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
        .last()
        .map_or(buffer.len(), |(i, _)| i);
    &buffer[start..]
}

fn paren_balance(buffer: &str) -> i64 {
    buffer.chars().fold(0, |depth, c| match c {
        '(' => depth + 1,
        ')' => depth - 1,
        _ => depth,
    })
}

/// Buffer for a token typed after an error or a finished calculation.
pub fn start_fresh(token: &Token) -> String {
    match token {
        t if t.needs_left_operand() => "0".to_string(),
        t if t.is_zeros() => "0".to_string(),
        Token::Dot => "0.".to_string(),
        other => other.text(),
    }
}

pub fn append(buffer: &str, token: &Token) -> String {
    let last = buffer.chars().last();
    let trailing = trailing_number(buffer);
    let after_operator_or_open = last.map_or(true, |c| is_operator(c) || c == '(');

    if token.is_zeros() {
        if trailing == "0" || buffer == "0" {
            return buffer.to_string();
        }
        if after_operator_or_open {
            return format!("{}0", buffer);
        }
    }

    // a zero run that does not extend a number starts one with a single zero
    let single_zero = Token::Digits("0".to_string());
    let token = if token.is_zeros() && trailing.is_empty() { &single_zero } else { token };

    if buffer == "0" {
        return match token {
            t if t.needs_left_operand() => buffer.to_string(),
            Token::Dot => "0.".to_string(),
            other => other.text(),
        };
    }

    if trailing == "0" && matches!(token, Token::Digits(_) | Token::Answer(_) | Token::Open) {
        return format!("{}{}", &buffer[..buffer.len() - 1], token.text());
    }

    if *token == Token::Open && (!trailing.is_empty() || last == Some('%')) {
        return format!("{}×(", buffer);
    }

    if last == Some('(') {
        let rejected = match token {
            Token::Operator(op) => *op != '-',
            Token::Percent | Token::Close => true,
            _ => false,
        };
        if rejected {
            return buffer.to_string();
        }
    }

    if last == Some(')') {
        match token {
            Token::Digits(_) | Token::Open | Token::Answer(_) => {
                return format!("{}×{}", buffer, token.text());
            }
            Token::Dot => return format!("{}×0.", buffer),
            _ => {}
        }
    }

    if let Token::Answer(answer) = token {
        if !trailing.is_empty() || last == Some('%') {
            return format!("{}×{}", buffer, answer);
        }
    }

    if *token == Token::Dot {
        if trailing.contains('.') {
            return buffer.to_string();
        }
        if after_operator_or_open {
            return format!("{}0.", buffer);
        }
    }

    if let Token::Operator(op) = *token {
        if let Some(prev) = last.filter(|&c| is_operator(c)) {
            if op == '-' && matches!(prev, '×' | '÷') {
                return format!("{}-", buffer);
            }
            let base = buffer.trim_end_matches(is_operator);
            if base.is_empty() || base.ends_with('(') {
                return buffer.to_string();
            }
            return format!("{}{}", base, op);
        }
    }

    format!("{}{}", buffer, token.text())
}

pub fn backspace(buffer: &str) -> String {
    let mut next = buffer.to_string();
    next.pop();
    if next.is_empty() || next == "-" {
        "0".to_string()
    } else {
        next
    }
}

fn is_plain_number(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let (whole, frac) = match digits.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (digits, ""),
    };
    !whole.is_empty() && whole.chars().all(|c| c.is_ascii_digit()) && frac.chars().all(|c| c.is_ascii_digit())
}

/// Flip the sign of a buffer holding a single number. `None` when the buffer
/// is anything else, including `"0"`.
pub fn toggle_sign(buffer: &str) -> Option<String> {
    if buffer == "0" || !is_plain_number(buffer) {
        return None;
    }
    Some(match buffer.strip_prefix('-') {
        Some(positive) => positive.to_string(),
        None => format!("-{}", buffer),
    })
}

/// The single parenthesis key: closes when something is open and the buffer
/// can end there, opens otherwise.
pub fn parenthesis(buffer: &str) -> String {
    if buffer == "0" {
        return "(".to_string();
    }

    let last = buffer.chars().last();
    let can_close = last.map_or(false, |c| c != '(' && !is_operator(c));
    if paren_balance(buffer) > 0 && can_close {
        return format!("{})", buffer);
    }

    match last {
        Some(c) if c.is_ascii_digit() || matches!(c, '.' | ')' | '%') => format!("{}×(", buffer),
        _ => format!("{}(", buffer),
    }
}
