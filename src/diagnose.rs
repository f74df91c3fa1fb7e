//! Locate what broke an expression and, when a repair is unambiguous,
//! propose one.
//!
//! Repairs are limited to removing a single trailing operator, removing a
//! `%` that has no operand, and appending the missing `)` characters. A
//! candidate is only offered if it evaluates.

use crate::error::{CalcError, EvalError};
use crate::evaluator::evaluate;
use crate::sanitize::sanitize;

/// The failed expression split around the offending span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetails {
    pub pre: String,
    pub highlight: String,
    pub post: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    pub details: Option<ErrorDetails>,
    pub suggestion: Option<String>,
    /// Short explanation for the suggestion banner.
    pub hint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Problem {
    UnknownSymbol,
    MisplacedPercent,
    InvalidNumber,
    StrayOperator,
    MissingOperator,
    UnmatchedClose,
    EmptyParens,
    TrailingOperator,
    UnclosedParen,
    DivisionByZero,
}

impl Problem {
    fn hint(&self) -> &'static str {
        match self {
            Problem::UnknownSymbol => "The expression contains a symbol the calculator does not understand.",
            Problem::MisplacedPercent => "A percent sign needs a number before it.",
            Problem::InvalidNumber => "This number is not written correctly.",
            Problem::StrayOperator => "Two operators cannot appear here together.",
            Problem::MissingOperator => "An operator is missing between these values.",
            Problem::UnmatchedClose => "This closing parenthesis has no matching opening one.",
            Problem::EmptyParens => "Parentheses cannot be empty.",
            Problem::TrailingOperator => "The expression ends with an operator.",
            Problem::UnclosedParen => "A parenthesis was opened but never closed.",
            Problem::DivisionByZero => "Division by zero is undefined.",
        }
    }
}

struct Finding {
    problem: Problem,
    start: usize,
    end: usize,
}

fn is_operator(c: char) -> bool {
    matches!(c, '+' | '-' | '×' | '÷' | '*' | '/')
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

fn is_known(c: char) -> bool {
    is_number_char(c) || is_operator(c) || matches!(c, '%' | '(' | ')') || c.is_whitespace()
}

/// Index of the nearest non-whitespace char before `i`.
fn prev_solid(chars: &[char], i: usize) -> Option<usize> {
    (0..i).rev().find(|&j| !chars[j].is_whitespace())
}

fn next_solid(chars: &[char], i: usize) -> Option<usize> {
    (i + 1..chars.len()).find(|&j| !chars[j].is_whitespace())
}

fn misplaced_percents(chars: &[char]) -> Vec<usize> {
    chars
        .iter()
        .enumerate()
        .filter(|&(i, &c)| {
            c == '%'
                && match prev_solid(chars, i) {
                    None => true,
                    Some(j) => is_operator(chars[j]) || chars[j] == '(',
                }
        })
        .map(|(i, _)| i)
        .collect()
}

/// Number literals as `(start, end)` char ranges.
fn literals(chars: &[char]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if is_number_char(chars[i]) {
            let start = i;
            while i < chars.len() && is_number_char(chars[i]) {
                i += 1;
            }
            out.push((start, i));
        } else {
            i += 1;
        }
    }
    out
}

fn find_unknown(chars: &[char]) -> Option<Finding> {
    let i = chars.iter().position(|&c| !is_known(c))?;
    Some(Finding { problem: Problem::UnknownSymbol, start: i, end: i + 1 })
}

fn find_misplaced_percent(chars: &[char]) -> Option<Finding> {
    let i = *misplaced_percents(chars).first()?;
    Some(Finding { problem: Problem::MisplacedPercent, start: i, end: i + 1 })
}

fn find_invalid_number(chars: &[char]) -> Option<Finding> {
    literals(chars)
        .into_iter()
        .find(|&(start, end)| {
            let literal: String = chars[start..end].iter().collect();
            literal.parse::<f64>().is_err()
        })
        .map(|(start, end)| Finding { problem: Problem::InvalidNumber, start, end })
}

fn find_stray_operator(chars: &[char]) -> Option<Finding> {
    for (i, &c) in chars.iter().enumerate() {
        if !is_operator(c) {
            continue;
        }
        match prev_solid(chars, i) {
            // `+` is dropped by the sanitizer in this position, `-` is unary
            None if matches!(c, '×' | '÷' | '*' | '/') => {
                return Some(Finding { problem: Problem::StrayOperator, start: i, end: i + 1 });
            }
            Some(j) if chars[j] == '(' && matches!(c, '×' | '÷' | '*' | '/') => {
                return Some(Finding { problem: Problem::StrayOperator, start: i, end: i + 1 });
            }
            Some(j) if is_operator(chars[j]) && c != '-' => {
                return Some(Finding { problem: Problem::StrayOperator, start: j, end: i + 1 });
            }
            _ => {}
        }
    }
    None
}

fn find_missing_operator(chars: &[char]) -> Option<Finding> {
    for (i, &c) in chars.iter().enumerate() {
        let Some(j) = next_solid(chars, i) else { continue };
        let next = chars[j];
        let value_end = is_number_char(c) || c == ')' || c == '%';
        if (value_end && next == '(') || (c == ')' && is_number_char(next)) {
            return Some(Finding { problem: Problem::MissingOperator, start: i, end: j + 1 });
        }
    }
    None
}

fn find_unmatched_close(chars: &[char]) -> Option<Finding> {
    let mut depth = 0usize;
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => {
                return Some(Finding { problem: Problem::UnmatchedClose, start: i, end: i + 1 });
            }
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn find_empty_parens(chars: &[char]) -> Option<Finding> {
    chars.iter().enumerate().find_map(|(i, &c)| {
        let j = next_solid(chars, i)?;
        (c == '(' && chars[j] == ')').then(|| Finding { problem: Problem::EmptyParens, start: i, end: j + 1 })
    })
}

fn find_trailing_operator(chars: &[char]) -> Option<Finding> {
    let i = prev_solid(chars, chars.len())?;
    is_operator(chars[i]).then(|| Finding { problem: Problem::TrailingOperator, start: i, end: i + 1 })
}

/// Opening parens left unmatched, innermost last.
fn unclosed(chars: &[char]) -> Vec<usize> {
    let mut stack = Vec::new();
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '(' => stack.push(i),
            ')' => {
                stack.pop();
            }
            _ => {}
        }
    }
    stack
}

fn find_unclosed_paren(chars: &[char]) -> Option<Finding> {
    let i = *unclosed(chars).last()?;
    Some(Finding { problem: Problem::UnclosedParen, start: i, end: i + 1 })
}

fn find_division_by_zero(chars: &[char]) -> Option<Finding> {
    for (start, end) in literals(chars) {
        let is_zero = chars[start..end]
            .iter()
            .collect::<String>()
            .parse::<f64>()
            .map(|v| v == 0.0)
            .unwrap_or(false);
        if !is_zero {
            continue;
        }
        if let Some(j) = prev_solid(chars, start) {
            if matches!(chars[j], '÷' | '/') {
                return Some(Finding { problem: Problem::DivisionByZero, start: j, end });
            }
        }
    }
    None
}

fn locate(chars: &[char], error: &CalcError) -> Option<Finding> {
    let non_finite = matches!(error, CalcError::InvalidExpression(EvalError::NonFinite));
    if non_finite {
        if let Some(found) = find_division_by_zero(chars) {
            return Some(found);
        }
    }

    find_unknown(chars)
        .or_else(|| find_misplaced_percent(chars))
        .or_else(|| find_invalid_number(chars))
        .or_else(|| find_stray_operator(chars))
        .or_else(|| find_missing_operator(chars))
        .or_else(|| find_unmatched_close(chars))
        .or_else(|| find_empty_parens(chars))
        .or_else(|| find_trailing_operator(chars))
        .or_else(|| find_unclosed_paren(chars))
        .or_else(|| find_division_by_zero(chars))
}

/// Apply every safe repair, returning the candidate and what was done.
fn repair(chars: &[char]) -> Option<(String, Vec<String>)> {
    if find_unmatched_close(chars).is_some() {
        return None;
    }

    let mut done = Vec::new();
    let percents = misplaced_percents(chars);
    let mut fixed: Vec<char> = chars
        .iter()
        .enumerate()
        .filter(|(i, _)| !percents.contains(i))
        .map(|(_, &c)| c)
        .collect();
    if !percents.is_empty() {
        done.push("remove the misplaced percent sign".to_string());
    }

    while fixed.last().map_or(false, |c| c.is_whitespace()) {
        fixed.pop();
    }
    if fixed.last().map_or(false, |&c| is_operator(c)) {
        fixed.pop();
        done.push("remove the trailing operator".to_string());
    }

    let missing = unclosed(&fixed).len();
    if missing > 0 {
        fixed.extend(std::iter::repeat(')').take(missing));
        done.push(if missing == 1 {
            "close 1 parenthesis".to_string()
        } else {
            format!("close {} parentheses", missing)
        });
    }

    if done.is_empty() || fixed.is_empty() {
        return None;
    }

    let candidate: String = fixed.into_iter().collect();
    evaluate(&sanitize(&candidate)).ok()?;
    Some((candidate, done))
}

/// True when `expression` holds a `%` with no operand in front of it.
pub fn has_misplaced_percent(expression: &str) -> bool {
    let chars: Vec<char> = expression.chars().collect();
    !misplaced_percents(&chars).is_empty()
}

pub fn diagnose(expression: &str, error: &CalcError) -> Diagnosis {
    let chars: Vec<char> = expression.chars().collect();
    if chars.iter().all(|c| c.is_whitespace()) {
        return Diagnosis {
            details: None,
            suggestion: None,
            hint: "Enter an expression to calculate.".to_string(),
        };
    }

    let finding = locate(&chars, error);
    let details = finding.as_ref().map(|f| ErrorDetails {
        pre: chars[..f.start].iter().collect(),
        highlight: chars[f.start..f.end].iter().collect(),
        post: chars[f.end..].iter().collect(),
    });

    match repair(&chars) {
        Some((fixed, done)) => {
            let mut hint = done.join(" and ");
            if let Some(first) = hint.get(..1) {
                hint = format!("{}{}.", first.to_uppercase(), &hint[1..]);
            }
            Diagnosis { details, suggestion: Some(fixed), hint }
        }
        None => {
            let hint = finding
                .map(|f| f.problem.hint())
                .unwrap_or("No automatic correction is available.")
                .to_string();
            Diagnosis { details, suggestion: None, hint }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(expression: &str) -> Diagnosis {
        let error = match evaluate(&sanitize(expression)) {
            Err(e) => CalcError::from(e),
            Ok(v) => panic!("{} evaluated to {}", expression, v),
        };
        diagnose(expression, &error)
    }

    fn span(d: &Diagnosis) -> (&str, &str, &str) {
        let details = d.details.as_ref().expect("details");
        (details.pre.as_str(), details.highlight.as_str(), details.post.as_str())
    }

    #[test]
    fn test_trailing_operator() {
        let d = run("12×3+");
        assert_eq!(span(&d), ("12×3", "+", ""));
        assert_eq!(d.suggestion.as_deref(), Some("12×3"));
        assert_eq!(d.hint, "Remove the trailing operator.");
    }

    #[test]
    fn test_unclosed_parens() {
        let d = run("(2+(3×4");
        assert_eq!(span(&d), ("(2+", "(", "3×4"));
        assert_eq!(d.suggestion.as_deref(), Some("(2+(3×4))"));
        assert_eq!(d.hint, "Close 2 parentheses.");
    }

    #[test]
    fn test_trailing_operator_inside_paren() {
        let d = run("(5+");
        assert_eq!(span(&d), ("(5", "+", ""));
        assert_eq!(d.suggestion.as_deref(), Some("(5)"));
    }

    #[test]
    fn test_unmatched_close_has_no_fix() {
        let d = run("5+3)");
        assert_eq!(span(&d), ("5+3", ")", ""));
        assert_eq!(d.suggestion, None);
    }

    #[test]
    fn test_division_by_zero() {
        let d = run("10÷0");
        assert_eq!(span(&d), ("10", "÷0", ""));
        assert_eq!(d.suggestion, None);
        assert_eq!(d.hint, Problem::DivisionByZero.hint());
    }

    #[test]
    fn test_misplaced_percent() {
        let d = run("50+%");
        assert_eq!(span(&d), ("50+", "%", ""));
        assert_eq!(d.suggestion.as_deref(), Some("50"));
        assert!(has_misplaced_percent("%5"));
        assert!(!has_misplaced_percent("5%"));
    }

    #[test]
    fn test_stray_operators() {
        let d = run("5+×3");
        assert_eq!(span(&d), ("5", "+×", "3"));
        assert_eq!(d.suggestion, None);

        let d = run("(×3)");
        assert_eq!(span(&d), ("(", "×", "3)"));
    }

    #[test]
    fn test_missing_operator_and_empty_parens() {
        let d = run("2(3)");
        assert_eq!(span(&d), ("", "2(", "3)"));
        let d = run("2×()");
        assert_eq!(span(&d), ("2×", "()", ""));
    }

    #[test]
    fn test_unknown_symbol() {
        let d = run("2^3");
        assert_eq!(span(&d), ("2", "^", "3"));
        assert_eq!(d.suggestion, None);
    }

    #[test]
    fn test_blank() {
        let d = diagnose("  ", &CalcError::from(EvalError::Empty));
        assert_eq!(d.details, None);
        assert_eq!(d.suggestion, None);
    }
}
