use thiserror::Error;

/// Why the evaluator rejected a sanitized expression.
///
/// Positions are character offsets into the sanitized string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected '{found}' at position {pos}")]
    UnexpectedToken { found: char, pos: usize },

    #[error("unknown symbol '{symbol}' at position {pos}")]
    UnknownSymbol { symbol: char, pos: usize },

    #[error("invalid number '{literal}' at position {pos}")]
    InvalidNumber { literal: String, pos: usize },

    #[error("result is not a finite number")]
    NonFinite,
}

impl EvalError {
    /// Syntax failures, as opposed to a well-formed expression with no finite value.
    pub fn is_syntax(&self) -> bool {
        !matches!(self, EvalError::NonFinite)
    }
}

/// User-facing calculation failure. `Display` is what the error banner shows.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("Invalid expression: {0}")]
    InvalidExpression(#[from] EvalError),

    #[error("Malformed percentage: '%' must follow a number or a closing parenthesis")]
    MalformedPercentage,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
