//! Arithmetic over the sanitized grammar.
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | primary
//! primary := number | '(' expr ')'
//! ```
//!
//! Only unary minus exists; a `+` in prefix position is an error here, the
//! sanitizer removes the one place where it is accepted.

use crate::error::EvalError;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: Kind,
    pos: usize,
}

impl Token {
    fn glyph(&self) -> char {
        match self.kind {
            Kind::Num(_) => '0',
            Kind::Plus => '+',
            Kind::Minus => '-',
            Kind::Star => '*',
            Kind::Slash => '/',
            Kind::LParen => '(',
            Kind::RParen => ')',
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let kind = match c {
            ' ' | '\t' => {
                i += 1;
                continue;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| EvalError::InvalidNumber { literal: literal.clone(), pos: start })?;
                tokens.push(Token { kind: Kind::Num(value), pos: start });
                continue;
            }
            '+' => Kind::Plus,
            '-' => Kind::Minus,
            '*' => Kind::Star,
            '/' => Kind::Slash,
            '(' => Kind::LParen,
            ')' => Kind::RParen,
            other => return Err(EvalError::UnknownSymbol { symbol: other, pos: i }),
        };
        tokens.push(Token { kind, pos: i });
        i += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.cursor).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn expr(&mut self) -> Result<f64, EvalError> {
        let mut acc = self.term()?;
        while let Some(token) = self.peek() {
            let op = match token.kind {
                Kind::Plus | Kind::Minus => token.kind,
                _ => break,
            };
            self.cursor += 1;
            let rhs = self.term()?;
            acc = finite(if op == Kind::Plus { acc + rhs } else { acc - rhs })?;
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<f64, EvalError> {
        let mut acc = self.unary()?;
        while let Some(token) = self.peek() {
            let op = match token.kind {
                Kind::Star | Kind::Slash => token.kind,
                _ => break,
            };
            self.cursor += 1;
            let rhs = self.unary()?;
            acc = finite(if op == Kind::Star { acc * rhs } else { acc / rhs })?;
        }
        Ok(acc)
    }

    fn unary(&mut self) -> Result<f64, EvalError> {
        match self.peek() {
            Some(Token { kind: Kind::Minus, .. }) => {
                self.cursor += 1;
                Ok(-self.unary()?)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, EvalError> {
        let token = self.bump().ok_or(EvalError::UnexpectedEnd)?;
        match token.kind {
            Kind::Num(value) => Ok(value),
            Kind::LParen => {
                let inner = self.expr()?;
                match self.bump() {
                    Some(Token { kind: Kind::RParen, .. }) => Ok(inner),
                    Some(other) => Err(EvalError::UnexpectedToken { found: other.glyph(), pos: other.pos }),
                    None => Err(EvalError::UnexpectedEnd),
                }
            }
            _ => Err(EvalError::UnexpectedToken { found: token.glyph(), pos: token.pos }),
        }
    }
}

fn finite(value: f64) -> Result<f64, EvalError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::NonFinite)
    }
}

/// Evaluate a sanitized expression.
///
/// Every intermediate result must be finite, so `1/(1/0)` fails rather than
/// quietly producing zero.
pub fn evaluate(sanitized: &str) -> Result<f64, EvalError> {
    let tokens = tokenize(sanitized)?;
    if tokens.is_empty() {
        return Err(EvalError::Empty);
    }

    let mut parser = Parser { tokens, cursor: 0 };
    let value = parser.expr()?;

    if let Some(extra) = parser.peek() {
        return Err(EvalError::UnexpectedToken { found: extra.glyph(), pos: extra.pos });
    }

    finite(value)
}
