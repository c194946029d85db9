use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use hedge_calculator::{
    DataLoader, DatasetCapabilities, HedgePipeline, MarketDataset, OutputSink, PipelineConfig, SimulationMode,
};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hedge_calculator")]
#[command(about = "Simulate forward prices and compute a risk-adjusted hedge price for one market")]
struct Args {
    /// Cleaned market CSV (e.g. clean_data/ERCOT_clean.csv)
    #[arg(short, long)]
    input: PathBuf,

    /// Asset name for the summary (defaults to the file's market name)
    #[arg(short, long)]
    asset: Option<String>,

    /// JSON configuration file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Monte Carlo samples per month and quote
    #[arg(short, long)]
    samples: Option<usize>,

    /// Seed for reproducible runs (omit for exploratory sampling)
    #[arg(long)]
    seed: Option<u64>,

    /// First month of the horizon (YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<String>,

    /// Last day of the horizon (YYYY-MM-DD)
    #[arg(long)]
    end_date: Option<String>,

    /// Also write the forward simulation CSV into this directory
    #[arg(long)]
    save_simulation: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    output: OutputFormat,

    /// Print which computations the dataset supports and exit
    #[arg(long)]
    capabilities: bool,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Summary,
}

fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(samples) = args.samples {
        config.sample_count = samples;
    }
    if args.seed.is_some() {
        config.random_seed = args.seed;
    }
    if let Some(start) = &args.start_date {
        config.horizon_start = NaiveDate::parse_from_str(start, "%Y-%m-%d")?;
    }
    if let Some(end) = &args.end_date {
        config.horizon_end = NaiveDate::parse_from_str(end, "%Y-%m-%d")?;
    }

    config.validate()?;
    Ok(config)
}

/// Column-level capability check; reads no curve and runs no simulation.
fn capabilities_report(dataset: &MarketDataset, config: &PipelineConfig) -> Result<String> {
    let capabilities = DatasetCapabilities::detect(dataset, config);
    Ok(serde_json::to_string_pretty(&capabilities)?)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = build_config(&args)?;

    let dataset = DataLoader::load_market(&args.input)
        .with_context(|| format!("loading {}", args.input.display()))?;
    let asset = args.asset.clone().unwrap_or_else(|| dataset.name().to_string());

    let pipeline = HedgePipeline::new(config);
    info!(
        "Starting hedge calculation for {} ({:?})",
        asset,
        pipeline.simulator().mode()
    );

    if args.capabilities {
        println!("{}", capabilities_report(&dataset, pipeline.config())?);
        return Ok(());
    }

    let analysis = pipeline.analyze(&dataset)?;

    if let Some(dir) = &args.save_simulation {
        let sink = OutputSink::new(dir);
        sink.write_records(
            &PipelineConfig::simulation_file_name(dataset.name()),
            &analysis.simulated,
        )?;
    }

    let summary = pipeline.risk_summary(&asset, &dataset, &analysis.simulated)?;

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            writer.serialize(&summary)?;
            writer.flush()?;
        }
        OutputFormat::Summary => {
            let fmt = |v: Option<f64>| v.map_or("n/a".to_string(), |p| format!("${:.2}/MWh", p));
            let mode = match pipeline.simulator().mode() {
                SimulationMode::Seeded(seed) => format!("seeded ({})", seed),
                SimulationMode::Exploratory => "exploratory".to_string(),
            };

            println!("Risk-Adjusted Hedge Price");
            println!("=========================");
            println!("Asset: {}", summary.asset);
            println!(
                "Horizon: {} to {} ({} simulated rows)",
                pipeline.config().horizon_start,
                pipeline.config().horizon_end,
                analysis.simulated.len()
            );
            println!("Samples: {} per quote, {}", pipeline.config().sample_count, mode);
            println!();
            println!("  P25: {}", fmt(summary.p25_price));
            println!("  P50: {}", fmt(summary.p50_price));
            println!("  P75: {}", fmt(summary.p75_price));
            println!("  Risk premium: {}", fmt(summary.risk_premium));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_report_without_simulating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MISO_clean.csv");
        std::fs::write(&path, "timestamp,gen,da_hub,peak_date,peak,off_peak\n2024-01-01 00:00:00,5,31,,,\n").unwrap();
        let dataset = DataLoader::load_market(&path).unwrap();

        let text = capabilities_report(&dataset, &PipelineConfig::default()).unwrap();
        let report: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(report["market"], "MISO");
        assert_eq!(report["hub_column"], "da_hub");
        assert_eq!(report["forward_curve"], true);
        assert_eq!(report["rt_basis"], false);
    }
}
