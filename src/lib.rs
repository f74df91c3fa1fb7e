pub mod calculator;
pub mod config;
pub mod diagnose;
pub mod error;
pub mod evaluator;
pub mod format;
pub mod history;
pub mod input;
pub mod notify;
pub mod sanitize;
pub mod store;
pub mod tax;

pub use calculator::{Calculator, ErrorState, Outcome, Phase, Session, Suggestion};
pub use config::Config;
pub use error::{CalcError, EvalError};
pub use history::{HistoryItem, HistoryLedger};
pub use tax::{apply_tax, TaxMode, TaxOutcome, TaxSettings};
