use anyhow::{Context, Result};
use glob::glob;
use hedge_calculator::data_loader::market_name_from_path;
use hedge_calculator::models::{RiskSummary, SimulatedMonth};
use hedge_calculator::{DataLoader, HedgePipeline, OutputSink, PipelineConfig};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::charts::ChartRenderer;
use crate::market_statistics::compute_statistics;

pub const RISK_SUMMARY_FILE: &str = "risk_adjusted_summary.csv";

/// Markets that finished a stage and markets that failed it, with the reason.
#[derive(Debug, Default)]
pub struct StageReport {
    pub completed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl StageReport {
    fn print(&self, stage: &str) {
        println!("\n{}", "=".repeat(60));
        println!("✅ {}: {} markets completed", stage, self.completed.len());
        if !self.failed.is_empty() {
            println!("⚠️  {} markets failed:", self.failed.len());
            for (market, reason) in &self.failed {
                println!("    {}: {}", market, reason);
            }
        }
    }
}

pub struct MarketProcessor {
    pipeline: HedgePipeline,
    analysis_sink: OutputSink,
    risk_sink: OutputSink,
}

impl MarketProcessor {
    pub fn new(config: PipelineConfig) -> Self {
        let analysis_sink = OutputSink::new(&config.output_directory);
        let risk_sink = OutputSink::new(&config.risk_output_directory);
        Self {
            pipeline: HedgePipeline::new(config),
            analysis_sink,
            risk_sink,
        }
    }

    fn config(&self) -> &PipelineConfig {
        self.pipeline.config()
    }

    fn progress(len: usize) -> Result<ProgressBar> {
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?,
        );
        Ok(pb)
    }

    /// Cleaned market files in the input directory, sorted by name.
    pub fn clean_files(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.config().input_directory.join("*_clean.csv");
        let pattern = pattern.to_str().context("input directory path is not UTF-8")?;
        let mut files: Vec<PathBuf> = glob(pattern)?.filter_map(|entry| entry.ok()).collect();
        files.sort();
        Ok(files)
    }

    /// Statistics, forward simulation and chart for every cleaned market file.
    pub fn analyze_all(&self) -> Result<StageReport> {
        let files = self.clean_files()?;
        println!("🔬 Analyzing {} markets from {}", files.len(), self.config().input_directory.display());
        println!("{}", "=".repeat(60));

        let mut report = StageReport::default();
        let pb = Self::progress(files.len())?;

        for file in &files {
            let market = market_name_from_path(file);
            pb.set_message(market.clone());

            match self.analyze_market(file) {
                Ok(rows) => {
                    pb.println(format!("  ✅ {}: {} simulated rows", market, rows));
                    report.completed.push(market);
                }
                Err(e) => {
                    pb.println(format!("  ❌ {}: {:#}", market, e));
                    report.failed.push((market, format!("{:#}", e)));
                }
            }
            pb.inc(1);
        }

        pb.finish_and_clear();
        report.print("Analysis");
        Ok(report)
    }

    /// Returns the number of simulated rows written.
    pub fn analyze_market(&self, path: &Path) -> Result<usize> {
        let dataset = DataLoader::load_market(path)?;
        let market = dataset.name().to_string();

        let analysis = self.pipeline.analyze(&dataset)?;

        let stats = compute_statistics(&dataset, &analysis.capabilities)?;
        stats.save(&self.analysis_sink, &market)?;
        debug!("{} capacity factor: {:?}", market, stats.get("capacity_factor"));

        // Always overwritten so a skipped market never leaves a previous run's rows behind
        self.analysis_sink.write_table(
            &PipelineConfig::simulation_file_name(&market),
            &SimulatedMonth::COLUMNS,
            &analysis.simulated,
        )?;

        if analysis.simulated.is_empty() {
            return Ok(0);
        }

        let charts = ChartRenderer::new(self.analysis_sink.dir());
        if let Err(e) = charts.forward_simulation(&market, &analysis.simulated) {
            warn!("forward chart for {} not rendered: {:#}", market, e);
        }

        Ok(analysis.simulated.len())
    }

    /// Risk summary for one configured market from its cleaned file and
    /// persisted simulation.
    pub fn risk_market(&self, market: &str) -> Result<RiskSummary> {
        let dataset = DataLoader::load_market(&self.config().clean_file(market))?;
        let sim_path = self
            .analysis_sink
            .dir()
            .join(PipelineConfig::simulation_file_name(market));
        let simulated = DataLoader::load_simulation(&sim_path)?;

        Ok(self.pipeline.risk_summary(market, &dataset, &simulated)?)
    }

    /// Summaries for the configured markets, in configuration order. Failed
    /// markets are left out of the table.
    pub fn risk_all(&self) -> Result<(Vec<RiskSummary>, StageReport)> {
        let markets = self.config().markets.clone();
        println!("\n💰 Computing risk-adjusted prices for {} markets", markets.len());
        println!("{}", "=".repeat(60));

        let mut summaries = Vec::new();
        let mut report = StageReport::default();
        let pb = Self::progress(markets.len())?;

        for market in &markets {
            pb.set_message(market.clone());
            match self.risk_market(market) {
                Ok(summary) => {
                    pb.println(format!(
                        "  ✅ {}: P25 {} | P50 {} | P75 {}",
                        market,
                        fmt_price(summary.p25_price),
                        fmt_price(summary.p50_price),
                        fmt_price(summary.p75_price)
                    ));
                    summaries.push(summary);
                    report.completed.push(market.clone());
                }
                Err(e) => {
                    pb.println(format!("  ❌ {}: {:#}", market, e));
                    report.failed.push((market.clone(), format!("{:#}", e)));
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        if !summaries.is_empty() {
            let path = self.risk_sink.write_records(RISK_SUMMARY_FILE, &summaries)?;
            println!("📄 Risk summary -> {}", path.display());

            let charts = ChartRenderer::new(self.risk_sink.dir());
            if let Err(e) = charts.risk_comparison(&summaries) {
                warn!("risk comparison chart not rendered: {:#}", e);
            }
        }

        report.print("Risk");
        Ok((summaries, report))
    }
}

fn fmt_price(price: Option<f64>) -> String {
    price.map(|p| format!("${:.2}", p)).unwrap_or_else(|| "n/a".to_string())
}

pub fn run_analysis(config: PipelineConfig) -> Result<()> {
    MarketProcessor::new(config).analyze_all()?;
    Ok(())
}

pub fn run_risk(config: PipelineConfig) -> Result<()> {
    MarketProcessor::new(config).risk_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fmt::Write as _;

    fn write_market(dir: &Path, market: &str, with_curve: bool) {
        let mut csv = String::from("timestamp,gen,rt_hub,rt_busbar,pop,peak_date,peak,off_peak\n");
        let curve = [("2026-01-01", "60", "35"), ("2026-04-01", "55", "30")];
        for day in 0..60 {
            let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(day);
            for (i, (hour, period, gen)) in [(2, "OP", 10.0), (14, "P", 40.0)].into_iter().enumerate() {
                let price = 30.0 + ((day * 5 + hour) % 17) as f64;
                let (d, p, o) = match curve.get(day as usize * 2 + i) {
                    Some(row) if with_curve => *row,
                    _ => ("", "", ""),
                };
                writeln!(
                    csv,
                    "{} {:02}:00:00,{},{},{},{},{},{},{}",
                    date,
                    hour,
                    gen,
                    price,
                    price - 2.0,
                    period,
                    d,
                    p,
                    o
                )
                .unwrap();
            }
        }
        std::fs::write(dir.join(format!("{}_clean.csv", market)), csv).unwrap();
    }

    fn config(root: &Path) -> PipelineConfig {
        PipelineConfig {
            input_directory: root.join("clean_data"),
            output_directory: root.join("analysis_outputs"),
            risk_output_directory: root.join("risk_outputs"),
            horizon_start: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            horizon_end: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
            sample_count: 50,
            random_seed: Some(3),
            markets: vec!["ERCOT".to_string(), "MISO".to_string()],
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_analyze_then_risk() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path());
        std::fs::create_dir_all(&config.input_directory).unwrap();
        write_market(&config.input_directory, "ERCOT", true);

        let processor = MarketProcessor::new(config.clone());
        let report = processor.analyze_all().unwrap();
        assert_eq!(report.completed, vec!["ERCOT"]);
        assert!(config.output_directory.join("ERCOT_summary_stats.csv").exists());
        assert!(config.output_directory.join("ERCOT_forward_sim.csv").exists());

        // MISO was never analyzed, so its cleaned file is missing
        let (summaries, report) = processor.risk_all().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].asset, "ERCOT");
        assert!(summaries[0].is_defined());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "MISO");

        let written = std::fs::read_to_string(config.risk_output_directory.join(RISK_SUMMARY_FILE)).unwrap();
        assert!(written.starts_with("asset,p25_price,p50_price,p75_price,risk_premium"));
        assert_eq!(written.lines().count(), 2);
    }

    #[test]
    fn test_market_without_curve_gets_undefined_row() {
        let root = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            markets: vec!["CAISO".to_string()],
            ..config(root.path())
        };
        std::fs::create_dir_all(&config.input_directory).unwrap();
        write_market(&config.input_directory, "CAISO", false);

        let processor = MarketProcessor::new(config.clone());
        let rows = processor
            .analyze_market(&config.input_directory.join("CAISO_clean.csv"))
            .unwrap();
        assert_eq!(rows, 0);
        assert!(config.output_directory.join("CAISO_summary_stats.csv").exists());

        let (summaries, report) = processor.risk_all().unwrap();
        assert!(report.failed.is_empty(), "{:?}", report.failed);
        assert_eq!(summaries, vec![RiskSummary::undefined("CAISO")]);

        let written = std::fs::read_to_string(config.risk_output_directory.join(RISK_SUMMARY_FILE)).unwrap();
        assert_eq!(written.lines().nth(1), Some("CAISO,,,,"));
    }

    #[test]
    fn test_rerun_without_curve_replaces_old_simulation() {
        let root = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            markets: vec!["CAISO".to_string()],
            ..config(root.path())
        };
        std::fs::create_dir_all(&config.input_directory).unwrap();
        let input = config.input_directory.join("CAISO_clean.csv");
        let processor = MarketProcessor::new(config.clone());

        write_market(&config.input_directory, "CAISO", true);
        assert!(processor.analyze_market(&input).unwrap() > 0);

        write_market(&config.input_directory, "CAISO", false);
        assert_eq!(processor.analyze_market(&input).unwrap(), 0);

        let sim_path = config.output_directory.join("CAISO_forward_sim.csv");
        assert!(DataLoader::load_simulation(&sim_path).unwrap().is_empty());

        let summary = processor.risk_market("CAISO").unwrap();
        assert!(!summary.is_defined());
        assert!(summary.risk_premium.is_none());
    }
}
