use crate::error::{HedgeError, Result};
use crate::models::{PriceObservation, SimulatedMonth};
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info};
use polars::prelude::*;
use std::path::Path;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Parse a timestamp or bare date cell; bare dates land on midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// Parse a numeric cell; anything that isn't a finite-looking number is missing.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// A cleaned market table, one row per settlement interval.
#[derive(Debug, Clone)]
pub struct MarketDataset {
    name: String,
    frame: DataFrame,
}

impl MarketDataset {
    pub fn new(name: impl Into<String>, frame: DataFrame) -> Self {
        Self {
            name: name.into(),
            frame,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_names().iter().any(|c| c == name)
    }

    fn series(&self, name: &str) -> Result<Series> {
        if !self.has_column(name) {
            return Err(HedgeError::missing_column(&self.name, &[name]));
        }
        Ok(self.frame.column(name)?.clone())
    }

    /// Numeric view of a column. Cells that don't coerce become `None`.
    pub fn numeric(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let series = self.series(name)?;

        if series.dtype() == &DataType::String {
            return Ok(series
                .str()?
                .into_iter()
                .map(|cell| cell.and_then(parse_number))
                .collect());
        }

        let coerced = series.cast(&DataType::Float64)?;
        Ok(coerced
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect())
    }

    /// Text view of a column; numeric cells are rendered as strings.
    pub fn text(&self, name: &str) -> Result<Vec<Option<String>>> {
        let series = self.series(name)?.cast(&DataType::String)?;
        Ok(series
            .str()?
            .into_iter()
            .map(|cell| cell.map(|s| s.to_string()))
            .collect())
    }

    pub fn timestamps(&self, name: &str) -> Result<Vec<Option<NaiveDateTime>>> {
        Ok(self
            .text(name)?
            .into_iter()
            .map(|cell| cell.as_deref().and_then(parse_timestamp))
            .collect())
    }

    /// Materialize rows for whichever of the standard columns are present.
    pub fn observations(&self) -> Result<Vec<PriceObservation>> {
        let height = self.height();
        let timestamps = self.optional(|d| d.timestamps("timestamp"))?;
        let generation = self.optional(|d| d.numeric("gen"))?;
        let rt_hub = self.optional(|d| d.numeric("rt_hub"))?;
        let rt_busbar = self.optional(|d| d.numeric("rt_busbar"))?;
        let da_hub = self.optional(|d| d.numeric("da_hub"))?;
        let da_busbar = self.optional(|d| d.numeric("da_busbar"))?;

        let pick = |col: &Option<Vec<Option<f64>>>, idx: usize| col.as_ref().and_then(|v| v[idx]);

        Ok((0..height)
            .map(|idx| PriceObservation {
                timestamp: timestamps.as_ref().and_then(|v| v[idx]),
                generation_mwh: pick(&generation, idx),
                rt_hub: pick(&rt_hub, idx),
                rt_busbar: pick(&rt_busbar, idx),
                da_hub: pick(&da_hub, idx),
                da_busbar: pick(&da_busbar, idx),
            })
            .collect())
    }

    fn optional<T>(&self, read: impl Fn(&Self) -> Result<T>) -> Result<Option<T>> {
        match read(self) {
            Ok(values) => Ok(Some(values)),
            Err(HedgeError::MissingColumn { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Market name from a cleaned file path: `ERCOT_clean.csv` -> `ERCOT`.
pub fn market_name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    stem.strip_suffix("_clean").unwrap_or(stem).to_string()
}

pub struct DataLoader;

impl DataLoader {
    /// Load a cleaned market CSV with full-file schema inference.
    pub fn load_market(path: &Path) -> Result<MarketDataset> {
        if !path.exists() {
            return Err(HedgeError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "cleaned market file not found"),
            ));
        }

        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        let name = market_name_from_path(path);
        info!("Loaded {}: {} rows, columns = {:?}", name, frame.height(), frame.get_column_names());

        Ok(MarketDataset::new(name, frame))
    }

    /// Read back a persisted forward simulation.
    pub fn load_simulation(path: &Path) -> Result<Vec<SimulatedMonth>> {
        let file = std::fs::File::open(path).map_err(|e| HedgeError::io(path, e))?;
        let mut reader = csv::Reader::from_reader(file);

        let mut months = Vec::new();
        for record in reader.deserialize() {
            months.push(record?);
        }

        debug!("Read {} simulated rows from {}", months.len(), path.display());
        Ok(months)
    }
}
