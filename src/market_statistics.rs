use anyhow::Result;
use hedge_calculator::simulator::sample_std;
use hedge_calculator::{DatasetCapabilities, MarketDataset, OutputSink, PriceObservation};
use std::path::PathBuf;

/// Ordered name -> value pairs; only computable statistics appear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketStatistics {
    pub values: Vec<(String, Option<f64>)>,
}

impl MarketStatistics {
    fn push(&mut self, name: impl Into<String>, value: Option<f64>) {
        self.values.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| *v)
    }

    pub fn save(&self, sink: &OutputSink, market: &str) -> Result<PathBuf> {
        let header: Vec<String> = self.values.iter().map(|(n, _)| n.clone()).collect();
        let row: Vec<String> = self
            .values
            .iter()
            .map(|(_, v)| v.map(|x| x.to_string()).unwrap_or_default())
            .collect();
        Ok(sink.write_row(&format!("{}_summary_stats.csv", market), &header, &row)?)
    }
}

fn mean(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}

fn max(values: &[Option<f64>]) -> Option<f64> {
    values.iter().flatten().copied().reduce(f64::max)
}

fn difference(a: &[Option<f64>], b: &[Option<f64>]) -> Vec<Option<f64>> {
    a.iter()
        .zip(b)
        .map(|(x, y)| Some((*x)? - (*y)?))
        .collect()
}

/// Pearson correlation over rows where both sides are present.
pub fn correlation(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let cov: f64 = pairs.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    let var_x: f64 = pairs.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    let var_y: f64 = pairs.iter().map(|(_, y)| (y - mean_y).powi(2)).sum();

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        None
    } else {
        Some(cov / denom)
    }
}

/// Share of all rows with a negative price; missing prices count as not negative.
pub fn negative_share(values: &[Option<f64>]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let negative = values.iter().filter(|v| matches!(v, Some(x) if *x < 0.0)).count();
    Some(negative as f64 / values.len() as f64)
}

fn column(rows: &[PriceObservation], field: fn(&PriceObservation) -> Option<f64>) -> Vec<Option<f64>> {
    rows.iter().map(field).collect()
}

/// Capacity factor, basis, volatility, correlation and negative-price stats.
pub fn compute_statistics(dataset: &MarketDataset, caps: &DatasetCapabilities) -> Result<MarketStatistics> {
    let rows = dataset.observations()?;
    let mut stats = MarketStatistics::default();

    let generation = caps.generation.then(|| column(&rows, |r| r.generation_mwh));

    if let Some(gen) = &generation {
        let capacity_factor = match (mean(gen), max(gen)) {
            (Some(avg), Some(peak)) if peak != 0.0 => Some(avg / peak),
            _ => None,
        };
        stats.push("capacity_factor", capacity_factor);
    }

    let prices: Vec<(&str, Vec<Option<f64>>)> = [
        ("rt_hub", column(&rows, |r| r.rt_hub)),
        ("rt_busbar", column(&rows, |r| r.rt_busbar)),
        ("da_hub", column(&rows, |r| r.da_hub)),
        ("da_busbar", column(&rows, |r| r.da_busbar)),
    ]
    .into_iter()
    .filter(|(name, _)| caps.price_columns.iter().any(|p| p == name))
    .collect();
    let price = |name: &str| prices.iter().find(|(n, _)| *n == name).map(|(_, v)| v);

    for (enabled, market) in [(caps.rt_basis, "rt"), (caps.da_basis, "da")] {
        if !enabled {
            continue;
        }
        if let (Some(hub), Some(busbar)) = (price(&format!("{}_hub", market)), price(&format!("{}_busbar", market))) {
            let basis = difference(hub, busbar);
            stats.push(format!("{}_basis_mean", market), mean(&basis));
            stats.push(format!("{}_basis_std", market), sample_std(&basis));
        }
    }

    for (name, values) in &prices {
        stats.push(format!("{}_std", name), sample_std(values));
    }

    if let Some(gen) = &generation {
        for (name, values) in &prices {
            stats.push(format!("corr_gen_{}", name), correlation(gen, values));
        }
    }

    for (name, values) in &prices {
        stats.push(format!("neg_{}_pct", name), negative_share(values));
    }

    Ok(stats)
}
