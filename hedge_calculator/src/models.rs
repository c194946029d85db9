use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time-of-day pricing block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Period {
    Peak,
    OffPeak,
    /// Any label that doesn't map to peak/off-peak, kept lowercased
    Other(String),
}

impl Period {
    /// Normalize a raw label: trim, lowercase, then map the known
    /// abbreviations. Unknown labels pass through.
    pub fn from_label(raw: &str) -> Self {
        let label = raw.trim().to_lowercase();
        match label.as_str() {
            "peak" | "p" => Period::Peak,
            "off_peak" | "op" | "off" => Period::OffPeak,
            _ => Period::Other(label),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Period::Peak => "peak",
            Period::OffPeak => "off_peak",
            Period::Other(label) => label,
        }
    }

    /// Case-insensitive "off" substring match on the label
    pub fn is_off_peak(&self) -> bool {
        match self {
            Period::Peak => false,
            Period::OffPeak => true,
            Period::Other(label) => label.to_lowercase().contains("off"),
        }
    }
}

impl Default for Period {
    fn default() -> Self {
        Period::OffPeak
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl From<String> for Period {
    fn from(raw: String) -> Self {
        Period::from_label(&raw)
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.label().to_string()
    }
}

/// One settlement interval of a market's cleaned history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceObservation {
    pub timestamp: Option<NaiveDateTime>,
    pub generation_mwh: Option<f64>,
    pub rt_hub: Option<f64>,
    pub rt_busbar: Option<f64>,
    pub da_hub: Option<f64>,
    pub da_busbar: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardQuote {
    pub effective_date: NaiveDateTime,
    pub period: Period,
    /// Missing when the source cell wasn't numeric
    pub price: Option<f64>,
}

/// Deduplicated forward quotes, sorted ascending by effective date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForwardCurve {
    pub quotes: Vec<ForwardQuote>,
}

impl ForwardCurve {
    pub fn new(quotes: Vec<ForwardQuote>) -> Self {
        Self { quotes }
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedMonth {
    pub month: NaiveDate,
    pub period: Period,
    pub mean: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub p90: Option<f64>,
}

impl SimulatedMonth {
    /// CSV header of a persisted simulation, in field order.
    pub const COLUMNS: [&'static str; 7] = ["month", "period", "mean", "p25", "p50", "p75", "p90"];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyGeneration {
    pub month: NaiveDate,
    pub period: Period,
    pub generation_mwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub asset: String,
    pub p25_price: Option<f64>,
    pub p50_price: Option<f64>,
    pub p75_price: Option<f64>,
    pub risk_premium: Option<f64>,
}

impl RiskSummary {
    /// Summary with every price undefined
    pub fn undefined(asset: &str) -> Self {
        Self {
            asset: asset.to_string(),
            p25_price: None,
            p50_price: None,
            p75_price: None,
            risk_premium: None,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.p25_price.is_some() && self.p50_price.is_some() && self.p75_price.is_some()
    }
}
