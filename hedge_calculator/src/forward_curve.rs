use crate::capabilities::{FORWARD_DATE_COLUMN, FORWARD_OFF_PEAK_COLUMN, FORWARD_PEAK_COLUMN};
use crate::data_loader::{parse_number, parse_timestamp, MarketDataset};
use crate::error::Result;
use crate::models::{ForwardCurve, ForwardQuote, Period};
use log::{debug, info};
use std::collections::HashSet;

pub struct ForwardCurveExtractor;

impl ForwardCurveExtractor {
    /// Pull the peak/off-peak quotes out of a wide table.
    ///
    /// Returns `Ok(None)` when any of the forward columns is absent: the market
    /// simply has no curve. An existing but unusable curve comes back empty.
    pub fn extract(dataset: &MarketDataset) -> Result<Option<ForwardCurve>> {
        let required = [FORWARD_DATE_COLUMN, FORWARD_PEAK_COLUMN, FORWARD_OFF_PEAK_COLUMN];
        if required.iter().any(|c| !dataset.has_column(c)) {
            info!(
                "{}: no forward curve columns ({}) found",
                dataset.name(),
                required.join(", ")
            );
            return Ok(None);
        }

        let dates = dataset.text(FORWARD_DATE_COLUMN)?;
        let peaks = dataset.text(FORWARD_PEAK_COLUMN)?;
        let off_peaks = dataset.text(FORWARD_OFF_PEAK_COLUMN)?;

        let rows: Vec<(&str, &str, &str)> = dates
            .iter()
            .zip(peaks.iter())
            .zip(off_peaks.iter())
            .filter_map(|((date, peak), off_peak)| {
                Some((present(date)?, present(peak)?, present(off_peak)?))
            })
            .collect();

        let curve = Self::from_rows(&rows);
        debug!(
            "{}: {} forward rows -> {} quotes",
            dataset.name(),
            rows.len(),
            curve.len()
        );
        Ok(Some(curve))
    }

    /// Build the long-format curve from complete (date, peak, off_peak) rows.
    pub fn from_rows(rows: &[(&str, &str, &str)]) -> ForwardCurve {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();

        for (raw_date, peak, off_peak) in rows {
            let Some(date) = parse_timestamp(raw_date) else {
                continue;
            };
            // First occurrence of a date wins
            if seen.insert(date) {
                kept.push((date, *peak, *off_peak));
            }
        }

        // Melt: every peak quote, then every off-peak quote
        let mut quotes: Vec<ForwardQuote> = kept
            .iter()
            .map(|(date, peak, _)| ForwardQuote {
                effective_date: *date,
                period: Period::Peak,
                price: parse_number(peak),
            })
            .chain(kept.iter().map(|(date, _, off_peak)| ForwardQuote {
                effective_date: *date,
                period: Period::OffPeak,
                price: parse_number(off_peak),
            }))
            .collect();

        quotes.sort_by_key(|q| q.effective_date);
        ForwardCurve::new(quotes)
    }
}

fn present(cell: &Option<String>) -> Option<&str> {
    cell.as_deref().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use polars::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn quotes_on(curve: &ForwardCurve, day: NaiveDate) -> Vec<&ForwardQuote> {
        curve.quotes.iter().filter(|q| q.effective_date.date() == day).collect()
    }

    #[test]
    fn test_duplicate_dates_keep_first() {
        let curve = ForwardCurveExtractor::from_rows(&[
            ("2026-01-01", "50", "30"),
            ("2026-01-01", "55", "35"),
            ("2026-02-01", "52", "31"),
        ]);

        let jan = quotes_on(&curve, date(2026, 1, 1));
        assert_eq!(jan.len(), 2);
        let peak = jan.iter().find(|q| q.period == Period::Peak).unwrap();
        assert_eq!(peak.price, Some(50.0));
        assert_eq!(curve.len(), 4);
    }

    #[test]
    fn test_sorted_with_peak_before_off_peak() {
        let curve = ForwardCurveExtractor::from_rows(&[
            ("2026-03-01", "60", "40"),
            ("2026-01-01", "50", "30"),
        ]);

        let order: Vec<(NaiveDate, Period)> = curve
            .quotes
            .iter()
            .map(|q| (q.effective_date.date(), q.period.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                (date(2026, 1, 1), Period::Peak),
                (date(2026, 1, 1), Period::OffPeak),
                (date(2026, 3, 1), Period::Peak),
                (date(2026, 3, 1), Period::OffPeak),
            ]
        );
    }

    #[test]
    fn test_bad_dates_dropped_bad_prices_kept_missing() {
        let curve = ForwardCurveExtractor::from_rows(&[
            ("soon", "50", "30"),
            ("2026-01-01", "TBD", "30"),
        ]);

        assert_eq!(curve.len(), 2);
        assert_eq!(curve.quotes[0].price, None);
        assert_eq!(curve.quotes[1].price, Some(30.0));
    }

    #[test]
    fn test_missing_columns_means_no_curve() {
        let frame = df!("peak_date" => &["2026-01-01"], "peak" => &[50.0]).unwrap();
        let dataset = MarketDataset::new("CAISO", frame);

        assert!(ForwardCurveExtractor::extract(&dataset).unwrap().is_none());
    }

    #[test]
    fn test_rows_with_gaps_dropped_and_empty_is_ok() {
        let frame = df!(
            "peak_date" => &[Some("2026-01-01"), None, Some("2026-02-01")],
            "peak" => &[Some(50.0), Some(51.0), None],
            "off_peak" => &[Some(30.0), Some(31.0), Some(32.0)]
        )
        .unwrap();
        let dataset = MarketDataset::new("ERCOT", frame);

        let curve = ForwardCurveExtractor::extract(&dataset).unwrap().unwrap();
        assert_eq!(curve.len(), 2);
        assert!(curve.quotes.iter().all(|q| q.effective_date.date() == date(2026, 1, 1)));

        let frame = df!(
            "peak_date" => &[None::<&str>],
            "peak" => &[Some(50.0)],
            "off_peak" => &[Some(30.0)]
        )
        .unwrap();
        let empty = ForwardCurveExtractor::extract(&MarketDataset::new("ERCOT", frame))
            .unwrap()
            .unwrap();
        assert!(empty.is_empty());
    }
}
