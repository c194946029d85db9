use crate::config::PipelineConfig;
use crate::data_loader::MarketDataset;
use serde::Serialize;
use std::fmt;

pub const FORWARD_DATE_COLUMN: &str = "peak_date";
pub const FORWARD_PEAK_COLUMN: &str = "peak";
pub const FORWARD_OFF_PEAK_COLUMN: &str = "off_peak";
pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const GENERATION_COLUMN: &str = "gen";
pub const PRICE_COLUMNS: [&str; 4] = ["rt_hub", "rt_busbar", "da_hub", "da_busbar"];

/// Column whose normalized name is `pop` (e.g. `POP`, `P/OP`, `p_op`).
pub fn find_period_column(columns: &[String]) -> Option<String> {
    columns
        .iter()
        .find(|c| c.to_lowercase().replace(['_', '/'], "") == "pop")
        .cloned()
}

/// First column of `priority` present in `columns`.
pub fn select_hub_column(columns: &[String], priority: &[String]) -> Option<String> {
    priority
        .iter()
        .find(|candidate| columns.iter().any(|c| c == *candidate))
        .cloned()
}

/// Which computations a dataset supports, decided once up front.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetCapabilities {
    pub market: String,
    pub timestamp: bool,
    pub generation: bool,
    pub period_column: Option<String>,
    pub hub_column: Option<String>,
    pub forward_curve: bool,
    pub rt_basis: bool,
    pub da_basis: bool,
    pub price_columns: Vec<String>,
}

impl DatasetCapabilities {
    pub fn detect(dataset: &MarketDataset, config: &PipelineConfig) -> Self {
        Self::from_columns(dataset.name(), &dataset.column_names(), config)
    }

    pub fn from_columns(market: &str, columns: &[String], config: &PipelineConfig) -> Self {
        let has = |name: &str| columns.iter().any(|c| c == name);

        Self {
            market: market.to_string(),
            timestamp: has(TIMESTAMP_COLUMN),
            generation: has(GENERATION_COLUMN),
            period_column: find_period_column(columns),
            hub_column: select_hub_column(columns, &config.hub_column_priority),
            forward_curve: has(FORWARD_DATE_COLUMN) && has(FORWARD_PEAK_COLUMN) && has(FORWARD_OFF_PEAK_COLUMN),
            rt_basis: has("rt_hub") && has("rt_busbar"),
            da_basis: has("da_hub") && has("da_busbar"),
            price_columns: PRICE_COLUMNS
                .iter()
                .filter(|c| has(**c))
                .map(|c| c.to_string())
                .collect(),
        }
    }

    pub fn can_simulate(&self) -> bool {
        self.forward_curve && self.hub_column.is_some()
    }

    pub fn can_profile_generation(&self) -> bool {
        self.timestamp && self.generation
    }

    /// Names of the enabled computations, for diagnostics.
    pub fn enabled(&self) -> Vec<&'static str> {
        let mut enabled = Vec::new();
        if self.generation {
            enabled.push("capacity_factor");
        }
        if self.rt_basis {
            enabled.push("rt_basis");
        }
        if self.da_basis {
            enabled.push("da_basis");
        }
        if !self.price_columns.is_empty() {
            enabled.push("volatility");
            enabled.push("negative_prices");
        }
        if self.generation && !self.price_columns.is_empty() {
            enabled.push("generation_correlation");
        }
        if self.forward_curve {
            enabled.push("forward_curve");
        }
        if self.can_simulate() {
            enabled.push("forward_simulation");
        }
        if self.can_profile_generation() {
            enabled.push("generation_profile");
        }
        enabled
    }
}

impl fmt::Display for DatasetCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: hub={} period={} enabled=[{}]",
            self.market,
            self.hub_column.as_deref().unwrap_or("none"),
            self.period_column.as_deref().unwrap_or("default off_peak"),
            self.enabled().join(", ")
        )
    }
}
