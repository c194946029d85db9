use crate::capabilities::DatasetCapabilities;
use crate::config::PipelineConfig;
use crate::data_loader::MarketDataset;
use crate::error::Result;
use crate::forward_curve::ForwardCurveExtractor;
use crate::generation::GenerationProfile;
use crate::models::{ForwardCurve, MonthlyGeneration, RiskSummary, SimulatedMonth};
use crate::risk::RiskCalculator;
use crate::simulator::ForwardSimulator;
use log::{info, warn};

/// Forward-side results for one market.
#[derive(Debug, Clone)]
pub struct ForwardAnalysis {
    pub capabilities: DatasetCapabilities,
    pub curve: Option<ForwardCurve>,
    pub simulated: Vec<SimulatedMonth>,
}

/// Runs the core steps for one market at a time.
pub struct HedgePipeline {
    config: PipelineConfig,
    simulator: ForwardSimulator,
}

impl HedgePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let simulator = ForwardSimulator::new(&config);
        Self { config, simulator }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn simulator(&self) -> &ForwardSimulator {
        &self.simulator
    }

    /// Extract the curve and simulate the horizon. A market without a curve,
    /// hub column or price dispersion ends up with no simulated rows.
    pub fn analyze(&self, dataset: &MarketDataset) -> Result<ForwardAnalysis> {
        let capabilities = DatasetCapabilities::detect(dataset, &self.config);
        info!("{}", capabilities);

        let curve = ForwardCurveExtractor::extract(dataset)?;
        let simulated = match &curve {
            Some(curve) => self.simulator.simulate_or_skip(dataset, curve)?,
            None => {
                warn!("No forward curve found for {}", dataset.name());
                Vec::new()
            }
        };

        Ok(ForwardAnalysis {
            capabilities,
            curve,
            simulated,
        })
    }

    /// Historical profile replicated over the simulated years. Missing
    /// generation data leaves the profile empty.
    pub fn replicated_generation(
        &self,
        dataset: &MarketDataset,
        simulated: &[SimulatedMonth],
    ) -> Result<Vec<MonthlyGeneration>> {
        let profile = match GenerationProfile::monthly_totals(dataset) {
            Ok(profile) => profile,
            Err(e) if e.is_skippable() => {
                warn!("{}", e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let years = GenerationProfile::simulation_years(simulated);
        Ok(GenerationProfile::replicate(&profile, &years))
    }

    pub fn risk_summary(
        &self,
        asset: &str,
        dataset: &MarketDataset,
        simulated: &[SimulatedMonth],
    ) -> Result<RiskSummary> {
        let generation = self.replicated_generation(dataset, simulated)?;
        Ok(RiskCalculator::summarize(asset, simulated, &generation))
    }
}
