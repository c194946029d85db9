use anyhow::Result;
use chrono::NaiveDate;
use hedge_calculator::models::{Period, RiskSummary, SimulatedMonth};
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const P25_COLOR: RGBColor = RGBColor(0xef, 0x47, 0x6f);
const P50_COLOR: RGBColor = RGBColor(0xff, 0xd1, 0x66);
const P75_COLOR: RGBColor = RGBColor(0x06, 0xd6, 0xa0);

/// One period's monthly `(month, p25, mean, p75)` points, ascending by month.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodBand {
    pub period: Period,
    pub points: Vec<(NaiveDate, f64, f64, f64)>,
}

/// Group simulated rows into per-period bands, dropping rows with a missing
/// mean or quartile.
pub fn period_bands(simulated: &[SimulatedMonth]) -> Vec<PeriodBand> {
    let mut grouped: BTreeMap<Period, Vec<(NaiveDate, f64, f64, f64)>> = BTreeMap::new();
    for row in simulated {
        if let (Some(p25), Some(mean), Some(p75)) = (row.p25, row.mean, row.p75) {
            grouped
                .entry(row.period.clone())
                .or_default()
                .push((row.month, p25, mean, p75));
        }
    }

    grouped
        .into_iter()
        .map(|(period, mut points)| {
            points.sort_by_key(|(month, ..)| *month);
            PeriodBand { period, points }
        })
        .collect()
}

/// Padded y-axis range covering every band.
fn band_range(bands: &[PeriodBand]) -> Option<(f64, f64)> {
    let values = bands
        .iter()
        .flat_map(|b| b.points.iter())
        .flat_map(|(_, p25, mean, p75)| [*p25, *mean, *p75]);
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min.is_finite() || !max.is_finite() {
        return None;
    }
    let pad = ((max - min) * 0.1).max(1.0);
    Some((min - pad, max + pad))
}

fn period_color(period: &Period) -> RGBColor {
    match period {
        Period::Peak => BLUE,
        Period::OffPeak => RED,
        Period::Other(_) => GREEN,
    }
}

/// Summaries that have all three quartile prices.
pub fn comparison_rows(summaries: &[RiskSummary]) -> Vec<(String, [f64; 3])> {
    summaries
        .iter()
        .filter_map(|s| Some((s.asset.clone(), [s.p25_price?, s.p50_price?, s.p75_price?])))
        .collect()
}

pub struct ChartRenderer {
    output_dir: PathBuf,
}

impl ChartRenderer {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// `<market>_forward_sim.png`: P25-P75 band and mean line per period.
    pub fn forward_simulation(&self, market: &str, simulated: &[SimulatedMonth]) -> Result<Option<PathBuf>> {
        let bands = period_bands(simulated);
        let (Some((y_min, y_max)), Some(first), Some(last)) = (
            band_range(&bands),
            bands.iter().filter_map(|b| b.points.first()).map(|p| p.0).min(),
            bands.iter().filter_map(|b| b.points.last()).map(|p| p.0).max(),
        ) else {
            return Ok(None);
        };
        let last = if last > first { last } else { first + chrono::Duration::days(1) };

        std::fs::create_dir_all(&self.output_dir)?;
        let output_path = self.output_dir.join(format!("{}_forward_sim.png", market));

        {
            let root = BitMapBackend::new(&output_path, (1000, 600)).into_drawing_area();
            root.fill(&WHITE)?;

            let mut chart = ChartBuilder::on(&root)
                .caption(format!("{} Simulated Forward Prices", market), ("sans-serif", 28).into_font())
                .margin(10)
                .x_label_area_size(40)
                .y_label_area_size(70)
                .build_cartesian_2d(first..last, y_min..y_max)?;

            chart
                .configure_mesh()
                .x_desc("Month")
                .y_desc("Price ($/MWh)")
                .x_label_formatter(&|d| d.format("%Y-%m").to_string())
                .draw()?;

            for band in &bands {
                let color = period_color(&band.period);

                let mut outline: Vec<(NaiveDate, f64)> = band.points.iter().map(|(d, _, _, p75)| (*d, *p75)).collect();
                outline.extend(band.points.iter().rev().map(|(d, p25, _, _)| (*d, *p25)));
                chart.draw_series(std::iter::once(Polygon::new(outline, color.mix(0.2))))?;

                let label = format!("{} mean", band.period);
                chart
                    .draw_series(LineSeries::new(
                        band.points.iter().map(|(d, _, mean, _)| (*d, *mean)),
                        color.stroke_width(2),
                    ))?
                    .label(label)
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], color));
            }

            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;

            root.present()?;
        }
        println!("  📈 Saved {}", output_path.display());
        Ok(Some(output_path))
    }

    /// `risk_adjusted_comparison.png`: grouped P25/P50/P75 bars per asset.
    pub fn risk_comparison(&self, summaries: &[RiskSummary]) -> Result<Option<PathBuf>> {
        let rows = comparison_rows(summaries);
        let max_val = rows
            .iter()
            .flat_map(|(_, prices)| prices.iter())
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if rows.is_empty() || max_val == 0.0 {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.output_dir)?;
        let output_path = self.output_dir.join("risk_adjusted_comparison.png");

        {
            let root = BitMapBackend::new(&output_path, (900, 600)).into_drawing_area();
            root.fill(&WHITE)?;

            let y_min = rows
                .iter()
                .flat_map(|(_, prices)| prices.iter())
                .fold(0.0_f64, |acc, v| acc.min(*v));

            let mut chart = ChartBuilder::on(&root)
                .caption("Risk-Adjusted Hedge Prices", ("sans-serif", 30).into_font())
                .margin(15)
                .x_label_area_size(50)
                .y_label_area_size(80)
                .build_cartesian_2d(-0.5..(rows.len() as f64 - 0.5), (y_min * 1.15)..(max_val * 1.15))?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_desc("Asset")
                .y_desc("Price ($/MWh)")
                .x_labels(rows.len())
                .x_label_formatter(&|x| {
                    let idx = x.round();
                    if (x - idx).abs() < 1e-6 && idx >= 0.0 {
                        rows.get(idx as usize).map(|(name, _)| name.clone()).unwrap_or_default()
                    } else {
                        String::new()
                    }
                })
                .draw()?;

            let width = 0.25;
            for (slot, (label, color)) in [("P25", P25_COLOR), ("P50", P50_COLOR), ("P75", P75_COLOR)]
                .into_iter()
                .enumerate()
            {
                let offset = (slot as f64 - 1.0) * width;
                let bars = rows.iter().enumerate().map(|(i, (_, prices))| {
                    let center = i as f64 + offset;
                    (center, prices[slot])
                });

                chart
                    .draw_series(bars.clone().map(|(center, value)| {
                        Rectangle::new(
                            [(center - width / 2.0, 0.0), (center + width / 2.0, value)],
                            color.filled(),
                        )
                    }))?
                    .label(label)
                    .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));

                chart.draw_series(bars.map(|(center, value)| {
                    Text::new(
                        format!("{:.2}", value),
                        (center - width / 2.0, value),
                        ("sans-serif", 12).into_font(),
                    )
                }))?;
            }

            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;

            root.present()?;
        }
        println!("  📊 Saved {}", output_path.display());
        Ok(Some(output_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn row(m: NaiveDate, period: Period, mean: Option<f64>) -> SimulatedMonth {
        SimulatedMonth {
            month: m,
            period,
            mean,
            p25: mean.map(|v| v - 5.0),
            p50: mean,
            p75: mean.map(|v| v + 5.0),
            p90: mean.map(|v| v + 9.0),
        }
    }

    #[test]
    fn test_bands_grouped_and_sorted() {
        let simulated = vec![
            row(month(2026, 2), Period::OffPeak, Some(30.0)),
            row(month(2026, 2), Period::Peak, Some(50.0)),
            row(month(2026, 1), Period::Peak, Some(48.0)),
            row(month(2026, 1), Period::OffPeak, None),
        ];

        let bands = period_bands(&simulated);
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[0].period, Period::Peak);
        assert_eq!(bands[0].points[0], (month(2026, 1), 43.0, 48.0, 53.0));
        assert_eq!(bands[1].points.len(), 1);

        let (lo, hi) = band_range(&bands).unwrap();
        assert!(lo < 25.0 && hi > 55.0);
    }

    #[test]
    fn test_nothing_to_draw() {
        let renderer = ChartRenderer::new(Path::new("unused"));
        assert!(renderer.forward_simulation("ERCOT", &[]).unwrap().is_none());
        assert!(renderer
            .risk_comparison(&[RiskSummary::undefined("MISO")])
            .unwrap()
            .is_none());
        assert!(!Path::new("unused").exists());
    }

    #[test]
    fn test_comparison_rows_skip_undefined() {
        let defined = RiskSummary {
            asset: "ERCOT".to_string(),
            p25_price: Some(41.2),
            p50_price: Some(45.0),
            p75_price: Some(48.8),
            risk_premium: Some(7.6),
        };
        let rows = comparison_rows(&[defined, RiskSummary::undefined("MISO")]);
        assert_eq!(rows, vec![("ERCOT".to_string(), [41.2, 45.0, 48.8])]);
    }
}
