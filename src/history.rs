use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::format::format_number;
use crate::tax::{TaxMode, TaxOutcome, TaxSettings};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: i64,
    pub expression: String,
    pub result: String,
    pub tax_result: Option<String>,
    pub tax_mode: Option<TaxMode>,
    pub tax_rate: Option<f64>,
    pub tax_label: Option<String>,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub notes: String,
}

impl HistoryItem {
    /// Record a successful calculation. Tax metadata is kept only when tax is enabled.
    pub fn new(
        id: i64,
        expression: &str,
        result: f64,
        tax: &TaxOutcome,
        settings: &TaxSettings,
        at: DateTime<Local>,
    ) -> Self {
        let enabled = settings.is_enabled;
        Self {
            id,
            expression: expression.to_string(),
            result: format_number(result),
            tax_result: tax.value.map(format_number),
            tax_mode: enabled.then_some(settings.mode),
            tax_rate: enabled.then_some(settings.rate),
            tax_label: tax.label.clone(),
            date: at.format(DATE_FORMAT).to_string(),
            time: at.format(TIME_FORMAT).to_string(),
            notes: String::new(),
        }
    }
}

/// Completed calculations, newest first, never longer than `max`.
#[derive(Debug, Clone)]
pub struct HistoryLedger {
    items: Vec<HistoryItem>,
    max: usize,
}

impl HistoryLedger {
    pub fn new(max: usize) -> Self {
        Self::from_items(Vec::new(), max)
    }

    pub fn from_items(mut items: Vec<HistoryItem>, max: usize) -> Self {
        let max = max.max(1);
        items.truncate(max);
        Self { items, max }
    }

    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn get(&self, id: i64) -> Option<&HistoryItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// An id that is at least `now_ms` and greater than every id handed out so far.
    pub fn next_id(&self, now_ms: i64) -> i64 {
        let newest = self.items.iter().map(|item| item.id).max();
        match newest {
            Some(id) if id >= now_ms => id + 1,
            _ => now_ms,
        }
    }

    /// Add the newest item, evicting the oldest ones past the bound.
    /// Returns how many were evicted.
    pub fn push(&mut self, item: HistoryItem) -> usize {
        self.items.insert(0, item);
        let evicted = self.items.len().saturating_sub(self.max);
        self.items.truncate(self.max);
        evicted
    }

    pub fn set_max(&mut self, max: usize) -> usize {
        self.max = max.max(1);
        let evicted = self.items.len().saturating_sub(self.max);
        self.items.truncate(self.max);
        evicted
    }

    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    pub fn update_note(&mut self, id: i64, note: &str) -> bool {
        match self.items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.notes = note.to_string();
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn count_on(&self, date: NaiveDate) -> usize {
        let day = date.format(DATE_FORMAT).to_string();
        self.items.iter().filter(|item| item.date == day).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(id: i64, expression: &str) -> HistoryItem {
        let at = Local.with_ymd_and_hms(2026, 3, 14, 9, 26, 0).unwrap();
        HistoryItem::new(id, expression, 1.0, &TaxOutcome::default(), &TaxSettings::default(), at)
    }

    #[test]
    fn test_item_fields() {
        let at = Local.with_ymd_and_hms(2026, 3, 14, 9, 26, 0).unwrap();
        let settings = TaxSettings {
            is_enabled: true,
            ..TaxSettings::default()
        };
        let tax = crate::tax::apply_tax(100.0, &settings);
        let entry = HistoryItem::new(7, "50+50", 100.0, &tax, &settings, at);
        assert_eq!(entry.result, "100");
        assert_eq!(entry.tax_result.as_deref(), Some("115"));
        assert_eq!(entry.tax_mode, Some(TaxMode::Add15));
        assert_eq!(entry.tax_label.as_deref(), Some("+15.00 (15%)"));
        assert_eq!(entry.date, "2026-03-14");
        assert_eq!(entry.time, "09:26");
        assert!(entry.notes.is_empty());

        let plain = item(8, "1");
        assert_eq!(plain.tax_result, None);
        assert_eq!(plain.tax_mode, None);
        assert_eq!(plain.tax_rate, None);
    }

    #[test]
    fn test_bound_evicts_oldest() {
        let mut ledger = HistoryLedger::new(3);
        for id in 1..=5 {
            ledger.push(item(id, &id.to_string()));
            assert!(ledger.len() <= 3);
        }
        let ids: Vec<i64> = ledger.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![5, 4, 3]);

        assert_eq!(ledger.set_max(1), 2);
        assert_eq!(ledger.items()[0].id, 5);
    }

    #[test]
    fn test_remove_and_note() {
        let mut ledger = HistoryLedger::new(10);
        ledger.push(item(1, "1+1"));
        ledger.push(item(2, "2+2"));
        assert!(ledger.update_note(1, "lunch"));
        assert_eq!(ledger.get(1).unwrap().notes, "lunch");
        assert!(!ledger.update_note(99, "x"));
        assert!(ledger.remove(2));
        assert!(!ledger.remove(2));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_next_id_is_monotonic() {
        let mut ledger = HistoryLedger::new(10);
        assert_eq!(ledger.next_id(1000), 1000);
        ledger.push(item(1000, "1"));
        assert_eq!(ledger.next_id(1000), 1001);
        assert_eq!(ledger.next_id(900), 1001);
        assert_eq!(ledger.next_id(2000), 2000);
    }

    #[test]
    fn test_count_on() {
        let mut ledger = HistoryLedger::new(10);
        ledger.push(item(1, "1"));
        ledger.push(item(2, "2"));
        assert_eq!(ledger.count_on(NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()), 2);
        assert_eq!(ledger.count_on(NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()), 0);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut entry = item(5, "2×3");
        entry.notes = "note".to_string();
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"taxResult\":null"));
        let back: HistoryItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
