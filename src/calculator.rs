//! The calculator session: the live expression buffer, the error banner,
//! the fix suggestion and the history ledger, mutated only through the
//! operations below. Every operation runs to completion; nothing here fails
//! outward. Evaluation errors become an [`ErrorState`], persistence errors are
//! logged and the in-memory state is kept.

use chrono::Local;
use serde::Serialize;

use crate::config::CalculatorConfig;
use crate::diagnose::{diagnose, has_misplaced_percent, ErrorDetails};
use crate::error::CalcError;
use crate::evaluator::evaluate;
use crate::format::format_number;
use crate::history::{HistoryItem, HistoryLedger};
use crate::input::{self, Token};
use crate::notify::Notifier;
use crate::sanitize::sanitize;
use crate::store::{self, KeyValueStore};
use crate::tax::{apply_tax, TaxSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorState {
    pub message: String,
    pub details: Option<ErrorDetails>,
}

/// A locally computed replacement for a failed expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub message: String,
    pub fix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Editing,
    Error,
    Executed,
}

/// Preferences and carried-over values a session starts from.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub tax: TaxSettings,
    pub max_history: usize,
    pub button_layout: String,
    pub last_answer: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::from_config(&CalculatorConfig::default())
    }
}

impl Session {
    pub fn from_config(config: &CalculatorConfig) -> Self {
        Self {
            tax: config.default_tax.clone(),
            max_history: config.default_max_history,
            button_layout: config.default_button_layout.clone(),
            last_answer: None,
        }
    }
}

/// Snapshot for front ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub result: String,
    pub tax_result: Option<String>,
    pub tax_label: Option<String>,
}

pub struct Calculator {
    buffer: String,
    executed: bool,
    error: Option<ErrorState>,
    suggestion: Option<Suggestion>,
    last_answer: Option<String>,
    last_outcome: Option<Outcome>,
    tax: TaxSettings,
    button_layout: String,
    ledger: HistoryLedger,
    store: Box<dyn KeyValueStore>,
    notifier: Box<dyn Notifier>,
}

/// Sanitize and evaluate, relabelling syntax errors caused by a stray `%`.
pub fn compute(expression: &str) -> Result<f64, CalcError> {
    evaluate(&sanitize(expression)).map_err(|e| {
        if e.is_syntax() && has_misplaced_percent(expression) {
            CalcError::MalformedPercentage
        } else {
            CalcError::InvalidExpression(e)
        }
    })
}

impl Calculator {
    pub fn new(session: Session, store: Box<dyn KeyValueStore>, notifier: Box<dyn Notifier>) -> Self {
        Self::with_history(session, Vec::new(), store, notifier)
    }

    fn with_history(
        session: Session,
        history: Vec<HistoryItem>,
        store: Box<dyn KeyValueStore>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            buffer: "0".to_string(),
            executed: false,
            error: None,
            suggestion: None,
            last_answer: session.last_answer,
            last_outcome: None,
            tax: session.tax,
            button_layout: session.button_layout,
            ledger: HistoryLedger::from_items(history, session.max_history),
            store,
            notifier,
        }
    }

    /// Start a session from whatever the store holds, falling back to `defaults`.
    pub fn restore(store: Box<dyn KeyValueStore>, notifier: Box<dyn Notifier>, defaults: &CalculatorConfig) -> Self {
        let session = Session {
            tax: store::load_or(store.as_ref(), store::TAX_SETTINGS_KEY, defaults.default_tax.clone()),
            max_history: store::load_or(store.as_ref(), store::MAX_HISTORY_KEY, defaults.default_max_history),
            button_layout: store::load_or(
                store.as_ref(),
                store::BUTTON_LAYOUT_KEY,
                defaults.default_button_layout.clone(),
            ),
            last_answer: None,
        };
        let history: Vec<HistoryItem> = store::load_or(store.as_ref(), store::HISTORY_KEY, Vec::new());
        log::debug!("restored {} history items", history.len());
        Self::with_history(session, history, store, notifier)
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    pub fn error(&self) -> Option<&ErrorState> {
        self.error.as_ref()
    }

    pub fn suggestion(&self) -> Option<&Suggestion> {
        self.suggestion.as_ref()
    }

    pub fn last_answer(&self) -> Option<&str> {
        self.last_answer.as_deref()
    }

    /// Primary and tax results of the latest successful calculation.
    pub fn last_outcome(&self) -> Option<&Outcome> {
        self.last_outcome.as_ref()
    }

    pub fn phase(&self) -> Phase {
        if self.error.is_some() {
            Phase::Error
        } else if self.executed {
            Phase::Executed
        } else {
            Phase::Editing
        }
    }

    pub fn tax_settings(&self) -> &TaxSettings {
        &self.tax
    }

    pub fn max_history(&self) -> usize {
        self.ledger.max()
    }

    pub fn button_layout(&self) -> &str {
        &self.button_layout
    }

    pub fn history(&self) -> &[HistoryItem] {
        self.ledger.items()
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    fn clear_error(&mut self) {
        self.error = None;
        self.suggestion = None;
    }

    fn set_buffer(&mut self, buffer: String) {
        log::debug!("buffer {:?} -> {:?}", self.buffer, buffer);
        self.buffer = buffer;
    }

    /// Type a button value. Unknown values are ignored.
    pub fn append(&mut self, value: &str) {
        match Token::parse(value) {
            Some(token) => self.press(token),
            None => log::debug!("ignoring unknown key {:?}", value),
        }
    }

    pub fn press(&mut self, token: Token) {
        let next = if self.error.is_some() {
            self.clear_error();
            input::start_fresh(&token)
        } else if self.executed {
            match token {
                Token::Operator(_) => format!("{}{}", self.buffer, token.text()),
                _ => input::start_fresh(&token),
            }
        } else {
            input::append(&self.buffer, &token)
        };
        self.executed = false;
        self.set_buffer(next);
    }

    pub fn backspace(&mut self) {
        self.clear_error();
        self.executed = false;
        let next = input::backspace(&self.buffer);
        self.set_buffer(next);
    }

    pub fn toggle_sign(&mut self) {
        self.clear_error();
        self.executed = false;
        if let Some(next) = input::toggle_sign(&self.buffer) {
            self.set_buffer(next);
        }
    }

    pub fn handle_parenthesis(&mut self) {
        self.clear_error();
        let next = if self.executed {
            "(".to_string()
        } else {
            input::parenthesis(&self.buffer)
        };
        self.executed = false;
        self.set_buffer(next);
    }

    pub fn append_answer(&mut self) {
        if let Some(answer) = self.last_answer.clone() {
            self.press(Token::Answer(answer));
        }
    }

    pub fn calculate(&mut self) {
        if self.executed || self.buffer == "0" {
            return;
        }

        let expression = self.buffer.clone();
        match compute(&expression) {
            Ok(value) => self.record(&expression, value),
            Err(err) => {
                log::info!("could not evaluate {:?}: {}", expression, err);
                let diagnosis = diagnose(&expression, &err);
                self.error = Some(ErrorState {
                    message: err.to_string(),
                    details: diagnosis.details,
                });
                self.suggestion = Some(Suggestion {
                    message: diagnosis.hint,
                    fix: diagnosis.suggestion,
                });
                self.executed = false;
            }
        }
    }

    fn record(&mut self, expression: &str, value: f64) {
        let now = Local::now();
        let tax = apply_tax(value, &self.tax);
        let id = self.ledger.next_id(now.timestamp_millis());
        let item = HistoryItem::new(id, expression, value, &tax, &self.tax, now);
        let result = item.result.clone();

        self.last_outcome = Some(Outcome {
            result: result.clone(),
            tax_result: item.tax_result.clone(),
            tax_label: item.tax_label.clone(),
        });
        let evicted = self.ledger.push(item);
        log::info!("{} = {} (history {}, evicted {})", expression, result, self.ledger.len(), evicted);
        self.persist_history();

        self.clear_error();
        self.set_buffer(result.clone());
        self.last_answer = Some(result);
        self.executed = true;
    }

    pub fn apply_fix(&mut self) {
        let fix = self.suggestion.as_ref().and_then(|s| s.fix.clone());
        if let Some(fix) = fix {
            self.clear_error();
            self.executed = false;
            self.set_buffer(fix);
        }
    }

    pub fn clear_all(&mut self) {
        self.clear_error();
        self.executed = false;
        self.last_outcome = None;
        self.set_buffer("0".to_string());
    }

    /// Replace the buffer with free text, e.g. from a text field or shared link.
    pub fn update_input(&mut self, text: &str) {
        self.clear_error();
        self.executed = false;
        let text = text.trim();
        let next = if text.is_empty() { "0".to_string() } else { text.to_string() };
        self.set_buffer(next);
    }

    pub fn load_from_history(&mut self, id: i64) -> bool {
        let Some(expression) = self.ledger.get(id).map(|item| item.expression.clone()) else {
            return false;
        };
        self.clear_error();
        self.executed = false;
        self.last_outcome = None;
        self.set_buffer(expression);
        true
    }

    /// Evaluate the buffer without touching any state.
    pub fn live_preview(&self) -> Option<String> {
        compute(&self.buffer).ok().map(format_number)
    }

    pub fn clear_history(&mut self) {
        if self.ledger.is_empty() {
            self.notifier.notify("History is already empty.");
            return;
        }
        self.ledger.clear();
        self.persist_history();
        self.notifier.notify("History cleared.");
    }

    pub fn delete_history_item(&mut self, id: i64) -> bool {
        let removed = self.ledger.remove(id);
        if removed {
            self.persist_history();
        }
        removed
    }

    pub fn update_note(&mut self, id: i64, note: &str) -> bool {
        let updated = self.ledger.update_note(id, note);
        if updated {
            self.persist_history();
        }
        updated
    }

    pub fn entry_count_today(&self) -> usize {
        self.ledger.count_on(Local::now().date_naive())
    }

    pub fn set_tax_settings(&mut self, settings: TaxSettings) {
        self.tax = settings;
        self.persist(store::TAX_SETTINGS_KEY, &self.tax.clone());
    }

    pub fn set_max_history(&mut self, max: usize) {
        let evicted = self.ledger.set_max(max);
        self.persist(store::MAX_HISTORY_KEY, &self.ledger.max());
        if evicted > 0 {
            self.persist_history();
        }
    }

    pub fn set_button_layout(&mut self, layout: &str) {
        self.button_layout = layout.to_string();
        self.persist(store::BUTTON_LAYOUT_KEY, &self.button_layout.clone());
    }

    fn persist_history(&mut self) {
        let items = self.ledger.items().to_vec();
        self.persist(store::HISTORY_KEY, &items);
    }

    fn persist<T: Serialize>(&mut self, key: &str, value: &T) {
        if let Err(e) = store::save(self.store.as_mut(), key, value) {
            log::warn!("could not persist '{}': {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::store::MemoryStore;
    use crate::tax::TaxMode;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn calculator() -> Calculator {
        Calculator::new(Session::default(), Box::new(MemoryStore::new()), Box::new(|_: &str| {}))
    }

    fn keys(calc: &mut Calculator, values: &[&str]) {
        for value in values {
            calc.append(value);
        }
    }

    #[test]
    fn test_initial_state() {
        let calc = calculator();
        assert_eq!(calc.buffer(), "0");
        assert_eq!(calc.phase(), Phase::Editing);
        assert!(calc.history().is_empty());
    }

    #[test]
    fn test_basic_calculation() {
        let mut calc = calculator();
        keys(&mut calc, &["5", "+", "3"]);
        assert_eq!(calc.buffer(), "5+3");

        calc.calculate();
        assert_eq!(calc.buffer(), "8");
        assert!(calc.is_executed());
        assert_eq!(calc.phase(), Phase::Executed);
        assert_eq!(calc.history().len(), 1);
        assert_eq!(calc.history()[0].expression, "5+3");
        assert_eq!(calc.history()[0].result, "8");
        assert_eq!(calc.last_answer(), Some("8"));
    }

    #[test]
    fn test_calculate_twice_is_noop() {
        let mut calc = calculator();
        keys(&mut calc, &["2", "×", "4"]);
        calc.calculate();
        calc.calculate();
        assert_eq!(calc.history().len(), 1);
        assert_eq!(calc.buffer(), "8");
    }

    #[test]
    fn test_calculate_on_zero_is_noop() {
        let mut calc = calculator();
        calc.calculate();
        assert!(calc.history().is_empty());
        assert_eq!(calc.phase(), Phase::Editing);
    }

    #[test]
    fn test_division_by_zero_sets_error() {
        let mut calc = calculator();
        calc.update_input("10÷0");
        calc.calculate();

        assert_eq!(calc.buffer(), "10÷0");
        assert!(calc.history().is_empty());
        assert_eq!(calc.phase(), Phase::Error);
        let error = calc.error().unwrap();
        assert_eq!(error.message, CalcError::from(EvalError::NonFinite).to_string());
        assert_eq!(error.details.as_ref().unwrap().highlight, "÷0");
        assert_eq!(calc.suggestion().unwrap().fix, None);
    }

    #[test]
    fn test_fix_is_applied() {
        let mut calc = calculator();
        calc.update_input("(4+5");
        calc.calculate();
        assert_eq!(calc.suggestion().unwrap().fix.as_deref(), Some("(4+5)"));

        calc.apply_fix();
        assert_eq!(calc.buffer(), "(4+5)");
        assert!(calc.error().is_none());
        assert!(calc.suggestion().is_none());

        calc.calculate();
        assert_eq!(calc.buffer(), "9");
    }

    #[test]
    fn test_apply_fix_without_suggestion() {
        let mut calc = calculator();
        keys(&mut calc, &["7"]);
        calc.apply_fix();
        assert_eq!(calc.buffer(), "7");
    }

    #[test]
    fn test_malformed_percentage_label() {
        let mut calc = calculator();
        calc.update_input("50+%");
        calc.calculate();
        assert_eq!(calc.error().unwrap().message, CalcError::MalformedPercentage.to_string());
        assert_eq!(calc.suggestion().unwrap().fix.as_deref(), Some("50"));
    }

    #[test]
    fn test_percent_divides_by_hundred() {
        let mut calc = calculator();
        keys(&mut calc, &["5", "0", "%"]);
        calc.calculate();
        assert_eq!(calc.buffer(), "0.5");
    }

    #[test]
    fn test_typing_after_error_starts_over() {
        let mut calc = calculator();
        calc.update_input("5+");
        calc.calculate();
        calc.append("7");
        assert_eq!(calc.buffer(), "7");
        assert_eq!(calc.phase(), Phase::Editing);

        calc.update_input("5+");
        calc.calculate();
        calc.append("×");
        assert_eq!(calc.buffer(), "0");
    }

    #[test]
    fn test_chaining_after_result() {
        let mut calc = calculator();
        keys(&mut calc, &["6", "×", "7"]);
        calc.calculate();
        calc.append("-");
        assert_eq!(calc.buffer(), "42-");
        assert!(!calc.is_executed());
        keys(&mut calc, &["2"]);
        calc.calculate();
        assert_eq!(calc.buffer(), "40");

        calc.append("3");
        assert_eq!(calc.buffer(), "3");
    }

    #[test]
    fn test_backspace_leaves_executed() {
        let mut calc = calculator();
        keys(&mut calc, &["1", "2", "+", "3"]);
        calc.calculate();
        calc.backspace();
        assert_eq!(calc.buffer(), "1");
        assert_eq!(calc.phase(), Phase::Editing);
    }

    #[test]
    fn test_toggle_sign() {
        let mut calc = calculator();
        calc.toggle_sign();
        assert_eq!(calc.buffer(), "0");
        keys(&mut calc, &["9"]);
        calc.toggle_sign();
        assert_eq!(calc.buffer(), "-9");
        keys(&mut calc, &["+", "1"]);
        calc.toggle_sign();
        assert_eq!(calc.buffer(), "-9+1");

        calc.calculate();
        calc.toggle_sign();
        assert_eq!(calc.buffer(), "8");
        assert!(!calc.is_executed());
    }

    #[test]
    fn test_parenthesis_after_result() {
        let mut calc = calculator();
        keys(&mut calc, &["1", "+", "1"]);
        calc.calculate();
        calc.handle_parenthesis();
        assert_eq!(calc.buffer(), "(");
    }

    #[test]
    fn test_append_answer() {
        let mut calc = calculator();
        calc.append_answer();
        assert_eq!(calc.buffer(), "0");

        keys(&mut calc, &["4", "×", "5"]);
        calc.calculate();
        calc.append("+");
        calc.append_answer();
        assert_eq!(calc.buffer(), "20+20");
        calc.calculate();
        assert_eq!(calc.buffer(), "40");

        calc.append_answer();
        assert_eq!(calc.buffer(), "40");
        assert!(!calc.is_executed());
    }

    #[test]
    fn test_tax_applied_to_history() {
        let mut calc = calculator();
        calc.set_tax_settings(TaxSettings {
            is_enabled: true,
            mode: TaxMode::Add15,
            rate: 15.0,
            show_tax_per_number: false,
        });
        calc.update_input("100");
        calc.calculate();

        let item = &calc.history()[0];
        assert_eq!(item.result, "100");
        assert_eq!(item.tax_result.as_deref(), Some("115"));
        assert_eq!(calc.buffer(), "100");
        assert_eq!(calc.last_outcome().unwrap().tax_result.as_deref(), Some("115"));
    }

    #[test]
    fn test_history_bound() {
        let mut calc = calculator();
        calc.set_max_history(3);
        for n in 1..=5 {
            calc.update_input(&format!("{}+0", n));
            calc.calculate();
            assert!(calc.history().len() <= 3);
        }
        let results: Vec<&str> = calc.history().iter().map(|i| i.result.as_str()).collect();
        assert_eq!(results, vec!["5", "4", "3"]);
    }

    #[test]
    fn test_history_mutations() {
        let mut calc = calculator();
        calc.update_input("1+1");
        calc.calculate();
        calc.update_input("2+2");
        calc.calculate();
        let newest = calc.history()[0].id;
        let oldest = calc.history()[1].id;
        assert!(newest > oldest);

        assert!(calc.update_note(oldest, "first"));
        assert_eq!(calc.history()[1].notes, "first");

        assert!(calc.load_from_history(oldest));
        assert_eq!(calc.buffer(), "1+1");
        assert!(!calc.is_executed());

        assert!(calc.delete_history_item(newest));
        assert!(!calc.delete_history_item(newest));
        assert_eq!(calc.history().len(), 1);
        assert_eq!(calc.entry_count_today(), 1);
    }

    #[test]
    fn test_clear_history_notifies() {
        let messages = Rc::new(RefCell::new(Vec::new()));
        let sink = messages.clone();
        let mut calc = Calculator::new(
            Session::default(),
            Box::new(MemoryStore::new()),
            Box::new(move |m: &str| sink.borrow_mut().push(m.to_string())),
        );

        calc.clear_history();
        calc.update_input("3×3");
        calc.calculate();
        calc.clear_history();

        assert!(calc.history().is_empty());
        assert_eq!(*messages.borrow(), vec!["History is already empty.", "History cleared."]);
    }

    #[test]
    fn test_live_preview_has_no_side_effects() {
        let mut calc = calculator();
        calc.update_input("2+2×2");
        assert_eq!(calc.live_preview().as_deref(), Some("6"));
        calc.update_input("2+");
        assert_eq!(calc.live_preview(), None);
        assert!(calc.error().is_none());
        assert!(calc.history().is_empty());
    }

    #[test]
    fn test_clear_all() {
        let mut calc = calculator();
        calc.update_input("(");
        calc.calculate();
        calc.clear_all();
        assert_eq!(calc.buffer(), "0");
        assert_eq!(calc.phase(), Phase::Editing);
    }
}
