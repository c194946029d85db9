use thiserror::Error;

pub type Result<T> = std::result::Result<T, HedgeError>;

#[derive(Debug, Error)]
pub enum HedgeError {
    /// A column needed by one computation is absent from the dataset
    #[error("{market}: missing column(s) {columns:?}")]
    MissingColumn { market: String, columns: Vec<String> },

    #[error("unparsable {field} value '{value}'")]
    UnparsableValue { field: String, value: String },

    /// Nothing usable to compute from (empty curve, no generation, ...)
    #[error("{market}: {reason}")]
    EmptyResult { market: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HedgeError {
    pub fn missing_column(market: &str, columns: &[&str]) -> Self {
        Self::MissingColumn {
            market: market.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn empty(market: &str, reason: impl Into<String>) -> Self {
        Self::EmptyResult {
            market: market.to_string(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Skippable errors disable one computation for one market; everything
    /// else terminates that market's processing.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::MissingColumn { .. } | Self::EmptyResult { .. })
    }
}
