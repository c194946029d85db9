use crate::capabilities::select_hub_column;
use crate::config::PipelineConfig;
use crate::data_loader::MarketDataset;
use crate::error::{HedgeError, Result};
use crate::models::{ForwardCurve, ForwardQuote, Period, SimulatedMonth};
use chrono::{Datelike, NaiveDate};
use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Quotes drawn per horizon month (usually one peak, one off-peak)
pub const QUOTES_PER_MONTH: usize = 2;

/// Deterministic (seeded) or exploratory (entropy-seeded) sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationMode {
    Seeded(u64),
    Exploratory,
}

impl SimulationMode {
    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map_or(SimulationMode::Exploratory, SimulationMode::Seeded)
    }

    /// Independent stream per market, so a market's draws don't depend on
    /// which markets ran before it.
    pub fn rng_for(&self, market: &str) -> ChaCha8Rng {
        match self {
            SimulationMode::Seeded(seed) => {
                let mut rng = ChaCha8Rng::seed_from_u64(*seed);
                rng.set_stream(stream_id(market));
                rng
            }
            SimulationMode::Exploratory => ChaCha8Rng::from_entropy(),
        }
    }
}

/// FNV-1a of the market name
fn stream_id(market: &str) -> u64 {
    market.bytes().fold(0xcbf29ce484222325u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x100000001b3)
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSummary {
    pub mean: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

/// Linear-interpolation percentile on a sorted slice (`pct` in 0..=100).
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let idx = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let w = idx - lo as f64;
    sorted[lo] * (1.0 - w) + sorted[hi] * w
}

pub fn summarize_samples(samples: &[f64]) -> Option<SampleSummary> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    Some(SampleSummary {
        mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
        p25: percentile(&sorted, 25.0),
        p50: percentile(&sorted, 50.0),
        p75: percentile(&sorted, 75.0),
        p90: percentile(&sorted, 90.0),
    })
}

/// Sample standard deviation (n - 1) over the present values.
pub fn sample_std(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.len() < 2 {
        return None;
    }
    let n = present.len() as f64;
    let mean = present.iter().sum::<f64>() / n;
    let variance = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// First day of every month between `start` and `end`, inclusive.
pub fn month_starts(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let mut current = if start.day() == 1 {
        Some(start)
    } else {
        next_month(start)
    };

    while let Some(month) = current {
        if month > end {
            break;
        }
        months.push(month);
        current = next_month(month);
    }
    months
}

fn next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

/// The `n` quotes closest in time to `anchor`, ties kept in curve order.
pub fn nearest_quotes(curve: &ForwardCurve, anchor: NaiveDate, n: usize) -> Vec<&ForwardQuote> {
    let Some(anchor) = anchor.and_hms_opt(0, 0, 0) else {
        return Vec::new();
    };

    let mut ranked: Vec<(i64, &ForwardQuote)> = curve
        .quotes
        .iter()
        .map(|q| ((q.effective_date - anchor).num_seconds().abs(), q))
        .collect();
    ranked.sort_by_key(|(distance, _)| *distance);

    ranked.into_iter().take(n).map(|(_, q)| q).collect()
}

pub struct ForwardSimulator {
    horizon_start: NaiveDate,
    horizon_end: NaiveDate,
    sample_count: usize,
    off_peak_multiplier: f64,
    hub_column_priority: Vec<String>,
    mode: SimulationMode,
}

impl ForwardSimulator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            horizon_start: config.horizon_start,
            horizon_end: config.horizon_end,
            sample_count: config.sample_count,
            off_peak_multiplier: config.off_peak_volatility_multiplier,
            hub_column_priority: config.hub_column_priority.clone(),
            mode: SimulationMode::from_seed(config.random_seed),
        }
    }

    pub fn with_mode(mut self, mode: SimulationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> SimulationMode {
        self.mode
    }

    pub fn horizon(&self) -> Vec<NaiveDate> {
        month_starts(self.horizon_start, self.horizon_end)
    }

    /// Volatility applied to one quote's period
    pub fn scaled_volatility(&self, period: &Period, volatility: f64) -> f64 {
        if period.is_off_peak() {
            volatility * self.off_peak_multiplier
        } else {
            volatility
        }
    }

    /// Hub column used for dispersion and its sample standard deviation.
    pub fn historical_volatility(&self, dataset: &MarketDataset) -> Result<(String, f64)> {
        let hub = select_hub_column(&dataset.column_names(), &self.hub_column_priority).ok_or_else(|| {
            let wanted: Vec<&str> = self.hub_column_priority.iter().map(String::as_str).collect();
            HedgeError::missing_column(dataset.name(), &wanted)
        })?;

        let prices = dataset.numeric(&hub)?;
        let std = sample_std(&prices).ok_or_else(|| {
            HedgeError::empty(dataset.name(), format!("fewer than two {} prices to estimate volatility", hub))
        })?;

        Ok((hub, std))
    }

    /// Simulate the full horizon for one market.
    ///
    /// Skippable errors (no hub column, empty curve, no dispersion) mean the
    /// market gets no forward simulation.
    pub fn simulate(&self, dataset: &MarketDataset, curve: &ForwardCurve) -> Result<Vec<SimulatedMonth>> {
        if curve.is_empty() {
            return Err(HedgeError::empty(dataset.name(), "forward curve has no usable quotes"));
        }

        let (hub, volatility) = self.historical_volatility(dataset)?;
        info!(
            "{}: simulating {} months from {} quotes (hub={}, sigma={:.2}, samples={})",
            dataset.name(),
            self.horizon().len(),
            curve.len(),
            hub,
            volatility,
            self.sample_count
        );

        let mut rng = self.mode.rng_for(dataset.name());
        self.simulate_with_rng(curve, volatility, &mut rng)
    }

    /// Like [`simulate`](Self::simulate), returning no records when the market is skipped.
    pub fn simulate_or_skip(&self, dataset: &MarketDataset, curve: &ForwardCurve) -> Result<Vec<SimulatedMonth>> {
        match self.simulate(dataset, curve) {
            Err(e) if e.is_skippable() => {
                warn!("Skipping forward simulation: {}", e);
                Ok(Vec::new())
            }
            other => other,
        }
    }

    pub fn simulate_with_rng<R: Rng + ?Sized>(
        &self,
        curve: &ForwardCurve,
        volatility: f64,
        rng: &mut R,
    ) -> Result<Vec<SimulatedMonth>> {
        let mut simulated = Vec::new();

        for month in self.horizon() {
            for quote in nearest_quotes(curve, month, QUOTES_PER_MONTH) {
                let summary = match quote.price {
                    Some(price) => {
                        let sigma = self.scaled_volatility(&quote.period, volatility);
                        let samples = self.draw_samples(rng, price, sigma)?;
                        summarize_samples(&samples)
                    }
                    None => {
                        debug!("{} {}: quote has no price", month, quote.period);
                        None
                    }
                };

                simulated.push(SimulatedMonth {
                    month,
                    period: quote.period.clone(),
                    mean: summary.map(|s| s.mean),
                    p25: summary.map(|s| s.p25),
                    p50: summary.map(|s| s.p50),
                    p75: summary.map(|s| s.p75),
                    p90: summary.map(|s| s.p90),
                });
            }
        }

        Ok(simulated)
    }

    pub fn draw_samples<R: Rng + ?Sized>(&self, rng: &mut R, price: f64, sigma: f64) -> Result<Vec<f64>> {
        let normal = Normal::new(price, sigma)
            .map_err(|e| HedgeError::InvalidConfig(format!("normal({}, {}): {}", price, sigma, e)))?;
        Ok((0..self.sample_count).map(|_| normal.sample(rng)).collect())
    }
}
