pub mod capabilities;
pub mod config;
pub mod data_loader;
pub mod error;
pub mod forward_curve;
pub mod generation;
pub mod models;
pub mod pipeline;
pub mod risk;
pub mod simulator;
pub mod sink;

pub use capabilities::DatasetCapabilities;
pub use config::PipelineConfig;
pub use data_loader::{DataLoader, MarketDataset};
pub use error::{HedgeError, Result};
pub use forward_curve::ForwardCurveExtractor;
pub use generation::GenerationProfile;
pub use models::{ForwardCurve, ForwardQuote, MonthlyGeneration, Period, PriceObservation, RiskSummary, SimulatedMonth};
pub use pipeline::{ForwardAnalysis, HedgePipeline};
pub use risk::RiskCalculator;
pub use simulator::{ForwardSimulator, SimulationMode};
pub use sink::OutputSink;
