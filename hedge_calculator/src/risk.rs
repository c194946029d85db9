use crate::models::{MonthlyGeneration, Period, RiskSummary, SimulatedMonth};
use chrono::NaiveDate;
use log::{info, warn};
use std::collections::HashMap;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A simulated row after the generation join.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedRow {
    pub month: NaiveDate,
    pub period: Period,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub generation_mwh: Option<f64>,
    pub imputed: bool,
}

pub struct RiskCalculator;

impl RiskCalculator {
    /// Left join simulated rows to the replicated profile on (month, period).
    ///
    /// A simulated row matching several generation records appears once per
    /// match. Unmatched rows take the mean replicated volume.
    pub fn join(simulated: &[SimulatedMonth], generation: &[MonthlyGeneration]) -> Vec<WeightedRow> {
        let mut by_key: HashMap<(NaiveDate, &Period), Vec<f64>> = HashMap::new();
        for row in generation {
            by_key
                .entry((row.month, &row.period))
                .or_default()
                .push(row.generation_mwh);
        }

        let fill = if generation.is_empty() {
            None
        } else {
            Some(generation.iter().map(|g| g.generation_mwh).sum::<f64>() / generation.len() as f64)
        };

        let mut rows = Vec::with_capacity(simulated.len());
        for sim in simulated {
            let base = |generation_mwh: Option<f64>, imputed: bool| WeightedRow {
                month: sim.month,
                period: sim.period.clone(),
                p25: sim.p25,
                p50: sim.p50,
                p75: sim.p75,
                generation_mwh,
                imputed,
            };

            match by_key.get(&(sim.month, &sim.period)) {
                Some(volumes) => rows.extend(volumes.iter().map(|v| base(Some(*v), false))),
                None => rows.push(base(fill, true)),
            }
        }

        rows
    }

    /// Σ(price × volume) / Σvolume for one percentile column.
    pub fn weighted_price(rows: &[WeightedRow], price: impl Fn(&WeightedRow) -> Option<f64>) -> Option<f64> {
        let total: f64 = rows.iter().filter_map(|r| r.generation_mwh).sum();
        if total == 0.0 {
            return None;
        }

        let revenue: f64 = rows
            .iter()
            .filter_map(|r| Some(price(r)? * r.generation_mwh?))
            .sum();
        Some(revenue / total)
    }

    /// Volume-weighted P25/P50/P75 and the P75 - P25 premium, rounded to cents.
    pub fn summarize(asset: &str, simulated: &[SimulatedMonth], generation: &[MonthlyGeneration]) -> RiskSummary {
        let rows = Self::join(simulated, generation);
        let imputed = rows.iter().filter(|r| r.imputed).count();
        if imputed > 0 {
            info!("{}: {} of {} rows imputed with mean generation", asset, imputed, rows.len());
        }

        let total: f64 = rows.iter().filter_map(|r| r.generation_mwh).sum();
        if total == 0.0 {
            warn!("{}: no generation after merge", asset);
            return RiskSummary::undefined(asset);
        }

        let p25 = Self::weighted_price(&rows, |r| r.p25);
        let p50 = Self::weighted_price(&rows, |r| r.p50);
        let p75 = Self::weighted_price(&rows, |r| r.p75);
        let premium = match (p75, p25) {
            (Some(high), Some(low)) => Some(high - low),
            _ => None,
        };

        RiskSummary {
            asset: asset.to_string(),
            p25_price: p25.map(round2),
            p50_price: p50.map(round2),
            p75_price: p75.map(round2),
            risk_premium: premium.map(round2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sim(month: NaiveDate, period: Period, price: f64) -> SimulatedMonth {
        SimulatedMonth {
            month,
            period,
            mean: Some(price),
            p25: Some(price - 5.0),
            p50: Some(price),
            p75: Some(price + 5.0),
            p90: Some(price + 8.0),
        }
    }

    fn gen(month: NaiveDate, period: Period, mwh: f64) -> MonthlyGeneration {
        MonthlyGeneration {
            month,
            period,
            generation_mwh: mwh,
        }
    }

    #[test]
    fn test_volume_weighted_average() {
        let simulated = vec![
            sim(date(2026, 1, 1), Period::Peak, 40.0),
            sim(date(2026, 2, 1), Period::Peak, 60.0),
        ];
        let generation = vec![
            gen(date(2026, 1, 1), Period::Peak, 100.0),
            gen(date(2026, 2, 1), Period::Peak, 300.0),
        ];

        let summary = RiskCalculator::summarize("ERCOT", &simulated, &generation);
        assert_eq!(summary.p50_price, Some(55.0));
        assert_eq!(summary.p25_price, Some(50.0));
        assert_eq!(summary.p75_price, Some(60.0));
        assert_eq!(summary.risk_premium, Some(10.0));
    }

    #[test]
    fn test_unmatched_rows_use_mean_generation() {
        let simulated = vec![
            sim(date(2026, 1, 1), Period::Peak, 40.0),
            sim(date(2026, 1, 1), Period::OffPeak, 20.0),
        ];
        let generation = vec![
            gen(date(2026, 1, 1), Period::Peak, 100.0),
            gen(date(2026, 3, 1), Period::Peak, 300.0),
        ];

        let rows = RiskCalculator::join(&simulated, &generation);
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].imputed);
        assert!(rows[1].imputed);
        assert_eq!(rows[1].generation_mwh, Some(200.0));

        // (40 * 100 + 20 * 200) / 300
        let summary = RiskCalculator::summarize("MISO", &simulated, &generation);
        assert_eq!(summary.p50_price, Some(26.67));
    }

    #[test]
    fn test_repeated_history_years_weight_twice() {
        let simulated = vec![sim(date(2026, 6, 1), Period::Peak, 50.0)];
        let generation = vec![
            gen(date(2026, 6, 1), Period::Peak, 100.0),
            gen(date(2026, 6, 1), Period::Peak, 300.0),
        ];

        let rows = RiskCalculator::join(&simulated, &generation);
        assert_eq!(rows.len(), 2);
        assert_eq!(RiskCalculator::summarize("CAISO", &simulated, &generation).p50_price, Some(50.0));
    }

    #[test]
    fn test_zero_generation_is_undefined() {
        let simulated = vec![sim(date(2026, 1, 1), Period::Peak, 40.0)];

        let summary = RiskCalculator::summarize("ERCOT", &simulated, &[]);
        assert_eq!(summary, RiskSummary::undefined("ERCOT"));

        let zero = vec![gen(date(2026, 1, 1), Period::Peak, 0.0)];
        let summary = RiskCalculator::summarize("ERCOT", &simulated, &zero);
        assert!(!summary.is_defined());
        assert!(summary.risk_premium.is_none());
    }

    #[test]
    fn test_missing_prices_skip_revenue_but_keep_volume() {
        let mut unpriced = sim(date(2026, 2, 1), Period::Peak, 0.0);
        unpriced.p25 = None;
        unpriced.p50 = None;
        unpriced.p75 = None;
        let simulated = vec![sim(date(2026, 1, 1), Period::Peak, 40.0), unpriced];
        let generation = vec![
            gen(date(2026, 1, 1), Period::Peak, 100.0),
            gen(date(2026, 2, 1), Period::Peak, 100.0),
        ];

        let summary = RiskCalculator::summarize("ERCOT", &simulated, &generation);
        assert_eq!(summary.p50_price, Some(20.0));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round2(26.666_666), 26.67);
        assert_eq!(round2(-1.234), -1.23);
    }
}
