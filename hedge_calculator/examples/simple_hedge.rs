use chrono::NaiveDate;
use hedge_calculator::models::{MonthlyGeneration, Period};
use hedge_calculator::{
    ForwardCurveExtractor, ForwardSimulator, GenerationProfile, PipelineConfig, RiskCalculator, SimulationMode,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn main() {
    // Quarterly peak / off-peak quotes
    let curve = ForwardCurveExtractor::from_rows(&[
        ("2026-01-01", "62.50", "38.00"),
        ("2026-04-01", "48.00", "29.50"),
        ("2026-07-01", "71.25", "41.00"),
        ("2026-10-01", "52.75", "33.25"),
    ]);

    let config = PipelineConfig {
        horizon_end: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
        ..PipelineConfig::default()
    };
    let simulator = ForwardSimulator::new(&config).with_mode(SimulationMode::Seeded(2026));

    // Historical hub price dispersion of $14/MWh
    let mut rng = ChaCha8Rng::seed_from_u64(2026);
    let simulated = simulator
        .simulate_with_rng(&curve, 14.0, &mut rng)
        .expect("finite volatility");

    // Solar-shaped profile: more energy in summer, mostly on-peak
    let profile: Vec<MonthlyGeneration> = (1..=12u32)
        .flat_map(|month| {
            let seasonal = 800.0 + 400.0 * (1.0 - ((month as f64 - 6.5) / 5.5).powi(2));
            [
                MonthlyGeneration {
                    month: NaiveDate::from_ymd_opt(2024, month, 1).unwrap(),
                    period: Period::Peak,
                    generation_mwh: seasonal * 0.8,
                },
                MonthlyGeneration {
                    month: NaiveDate::from_ymd_opt(2024, month, 1).unwrap(),
                    period: Period::OffPeak,
                    generation_mwh: seasonal * 0.2,
                },
            ]
        })
        .collect();

    let years = GenerationProfile::simulation_years(&simulated);
    let generation = GenerationProfile::replicate(&profile, &years);
    let summary = RiskCalculator::summarize("EXAMPLE_SOLAR", &simulated, &generation);

    println!("Simulated Forward Prices");
    println!("========================");
    for row in &simulated {
        println!(
            "  {} {:<9} mean ${:>7.2}  P25 ${:>7.2}  P75 ${:>7.2}",
            row.month,
            row.period,
            row.mean.unwrap_or(f64::NAN),
            row.p25.unwrap_or(f64::NAN),
            row.p75.unwrap_or(f64::NAN)
        );
    }

    println!();
    println!("Risk-Adjusted Hedge Price: {}", summary.asset);
    println!("  P25: ${:.2}/MWh", summary.p25_price.unwrap_or(f64::NAN));
    println!("  P50: ${:.2}/MWh", summary.p50_price.unwrap_or(f64::NAN));
    println!("  P75: ${:.2}/MWh", summary.p75_price.unwrap_or(f64::NAN));
    println!("  Risk premium: ${:.2}/MWh", summary.risk_premium.unwrap_or(f64::NAN));
}
