use anyhow::{bail, Context, Result};
use hedge_calculator::PipelineConfig;
use std::path::PathBuf;

mod charts;
mod cleaner;
mod market_processor;
mod market_statistics;

/// Value following `flag` on the command line, if the flag is present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>> {
    match args.iter().position(|a| a == flag) {
        Some(i) => match args.get(i + 1) {
            Some(value) if !value.starts_with("--") => Ok(Some(value.as_str())),
            _ => bail!("{} expects a value", flag),
        },
        None => Ok(None),
    }
}

fn load_config(args: &[String]) -> Result<PipelineConfig> {
    let mut config = match flag_value(args, "--config")? {
        Some(path) => PipelineConfig::from_json_file(&PathBuf::from(path))
            .with_context(|| format!("loading config {}", path))?,
        None => PipelineConfig::default(),
    };

    if let Some(seed) = flag_value(args, "--seed")? {
        config.random_seed = Some(seed.parse().with_context(|| format!("invalid --seed {}", seed))?);
    }
    if let Some(samples) = flag_value(args, "--samples")? {
        config.sample_count = samples
            .parse()
            .with_context(|| format!("invalid --samples {}", samples))?;
    }

    config.validate()?;
    Ok(config)
}

fn print_usage() {
    println!("Usage: market_risk_pipeline [MODE] [OPTIONS]");
    println!();
    println!("Modes:");
    println!("  --clean <raw_dir>   Clean raw sheet exports into the input directory");
    println!("  --analyze           Statistics, forward simulation and charts per market");
    println!("  --risk              Risk-adjusted hedge prices from saved simulations");
    println!("  --all               Analyze then risk (default)");
    println!();
    println!("Options:");
    println!("  --config <file>     JSON pipeline configuration");
    println!("  --seed <u64>        Reproducible simulation seed");
    println!("  --samples <n>       Monte Carlo samples per month and quote");
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let config = load_config(&args)?;
    let start = std::time::Instant::now();

    if args.iter().any(|a| a == "--clean") {
        // Raw sheet exports -> <sheet>_clean.csv
        match flag_value(&args, "--clean") {
            Ok(Some(raw_dir)) => cleaner::clean_all_sheets(&PathBuf::from(raw_dir), &config.input_directory)?,
            _ => {
                println!("Usage: --clean <raw_dir>");
                println!("Example: --clean raw_sheets");
            }
        }
    } else if args.iter().any(|a| a == "--analyze") {
        market_processor::run_analysis(config)?;
    } else if args.iter().any(|a| a == "--risk") {
        market_processor::run_risk(config)?;
    } else {
        // --all, or no mode given
        println!("🚀 Market Risk Pipeline");
        println!("{}", "=".repeat(60));
        market_processor::run_analysis(config.clone())?;
        market_processor::run_risk(config)?;
    }

    println!("\n✅ Done in {:?}", start.elapsed());
    Ok(())
}
