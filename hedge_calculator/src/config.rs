use crate::error::{HedgeError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SAMPLE_COUNT: usize = 200;
pub const DEFAULT_OFF_PEAK_MULTIPLIER: f64 = 0.7;

/// Everything the pipeline used to take from compiled-in constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory of `<market>_clean.csv` files
    pub input_directory: PathBuf,
    /// Statistics, forward simulations and per-market charts
    pub output_directory: PathBuf,
    /// Risk summary and comparison chart
    pub risk_output_directory: PathBuf,
    pub horizon_start: NaiveDate,
    pub horizon_end: NaiveDate,
    pub sample_count: usize,
    /// `None` runs exploratory (entropy-seeded) simulations
    pub random_seed: Option<u64>,
    pub off_peak_volatility_multiplier: f64,
    pub hub_column_priority: Vec<String>,
    /// Markets included in the risk summary
    pub markets: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_directory: PathBuf::from("clean_data"),
            output_directory: PathBuf::from("analysis_outputs"),
            risk_output_directory: PathBuf::from("risk_outputs"),
            horizon_start: NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid horizon start"),
            horizon_end: NaiveDate::from_ymd_opt(2030, 12, 31).expect("valid horizon end"),
            sample_count: DEFAULT_SAMPLE_COUNT,
            random_seed: None,
            off_peak_volatility_multiplier: DEFAULT_OFF_PEAK_MULTIPLIER,
            hub_column_priority: vec!["rt_hub".to_string(), "hub".to_string(), "da_hub".to_string()],
            markets: vec!["ERCOT".to_string(), "MISO".to_string(), "CAISO".to_string()],
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file; absent fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| HedgeError::io(path, e))?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_count == 0 {
            return Err(HedgeError::InvalidConfig("sample_count must be at least 1".into()));
        }
        if self.horizon_start > self.horizon_end {
            return Err(HedgeError::InvalidConfig(format!(
                "horizon_start {} is after horizon_end {}",
                self.horizon_start, self.horizon_end
            )));
        }
        if !self.off_peak_volatility_multiplier.is_finite() || self.off_peak_volatility_multiplier < 0.0 {
            return Err(HedgeError::InvalidConfig(
                "off_peak_volatility_multiplier must be a finite non-negative number".into(),
            ));
        }
        if self.hub_column_priority.is_empty() {
            return Err(HedgeError::InvalidConfig("hub_column_priority is empty".into()));
        }
        Ok(())
    }

    pub fn clean_file(&self, market: &str) -> PathBuf {
        self.input_directory.join(format!("{}_clean.csv", market))
    }

    pub fn simulation_file_name(market: &str) -> String {
        format!("{}_forward_sim.csv", market)
    }
}
