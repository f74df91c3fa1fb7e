use serde::{Deserialize, Serialize};

use crate::format::format_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaxMode {
    #[serde(rename = "add-15")]
    Add15,
    #[serde(rename = "divide-93")]
    Divide93,
    #[serde(rename = "custom")]
    Custom,
    #[serde(rename = "extract-custom")]
    ExtractCustom,
}

impl TaxMode {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "add-15" => Some(TaxMode::Add15),
            "divide-93" => Some(TaxMode::Divide93),
            "custom" => Some(TaxMode::Custom),
            "extract-custom" => Some(TaxMode::ExtractCustom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaxMode::Add15 => "add-15",
            TaxMode::Divide93 => "divide-93",
            TaxMode::Custom => "custom",
            TaxMode::ExtractCustom => "extract-custom",
        }
    }

    /// Rate shown next to the tax amount. Fixed modes ignore the configured rate.
    pub fn effective_rate(&self, rate: f64) -> f64 {
        match self {
            TaxMode::Add15 => 15.0,
            TaxMode::Divide93 => 7.0,
            TaxMode::Custom | TaxMode::ExtractCustom => rate,
        }
    }

    pub fn describe(&self, rate: f64) -> String {
        match self {
            TaxMode::Add15 => "Add 15%".to_string(),
            TaxMode::Divide93 => "Divide by 0.93".to_string(),
            TaxMode::Custom => format!("Add custom {}%", format_number(rate)),
            TaxMode::ExtractCustom => format!("Extract custom {}%", format_number(rate)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaxSettings {
    pub is_enabled: bool,
    pub mode: TaxMode,
    pub rate: f64,
    pub show_tax_per_number: bool,
}

impl Default for TaxSettings {
    fn default() -> Self {
        Self {
            is_enabled: false,
            mode: TaxMode::Add15,
            rate: 15.0,
            show_tax_per_number: false,
        }
    }
}

/// Secondary result derived from a primary result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaxOutcome {
    pub value: Option<f64>,
    pub label: Option<String>,
}

pub fn apply_tax(result: f64, settings: &TaxSettings) -> TaxOutcome {
    if !settings.is_enabled {
        return TaxOutcome::default();
    }

    let rate = settings.rate;
    let value = match settings.mode {
        TaxMode::Add15 => result * 1.15,
        TaxMode::Custom => result * (1.0 + rate / 100.0),
        TaxMode::ExtractCustom => result / (1.0 + rate / 100.0),
        TaxMode::Divide93 => result / 0.93,
    };

    // rate = -100 divides by zero in extract-custom
    if !value.is_finite() {
        log::warn!("tax mode {} at rate {} gave a non-finite value", settings.mode.as_str(), rate);
        return TaxOutcome::default();
    }

    let delta = value - result;
    let sign = if delta < 0.0 { '-' } else { '+' };
    let label = format!(
        "{}{:.2} ({}%)",
        sign,
        delta.abs(),
        format_number(settings.mode.effective_rate(rate))
    );

    TaxOutcome {
        value: Some(value),
        label: Some(label),
    }
}
