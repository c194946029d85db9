use crate::capabilities::{find_period_column, GENERATION_COLUMN, TIMESTAMP_COLUMN};
use crate::data_loader::MarketDataset;
use crate::error::{HedgeError, Result};
use crate::models::{MonthlyGeneration, Period, SimulatedMonth};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use log::{debug, info};
use std::collections::BTreeMap;

/// Same month/day in another year; 29 February becomes the 28th when the
/// target year has no leap day.
pub fn remap_year(date: NaiveDate, year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, date.month(), date.day()).unwrap_or_else(|| {
        NaiveDate::from_ymd_opt(year, date.month(), 28).unwrap_or(date)
    })
}

fn month_start(ts: NaiveDateTime) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(ts.year(), ts.month(), 1)
}

pub struct GenerationProfile;

impl GenerationProfile {
    /// Period label per row: mapped from the `pop`-like column when there is
    /// one, otherwise everything is off-peak.
    pub fn periods(dataset: &MarketDataset) -> Result<Vec<Period>> {
        match find_period_column(&dataset.column_names()) {
            Some(column) => {
                debug!("{}: period labels from column '{}'", dataset.name(), column);
                Ok(dataset
                    .text(&column)?
                    .into_iter()
                    .map(|cell| match cell.as_deref().map(str::trim) {
                        Some(label) if !label.is_empty() => Period::from_label(label),
                        _ => Period::OffPeak,
                    })
                    .collect())
            }
            None => {
                debug!("{}: no period column, treating all generation as off_peak", dataset.name());
                Ok(vec![Period::OffPeak; dataset.height()])
            }
        }
    }

    /// Total generation per (calendar month, period).
    pub fn monthly_totals(dataset: &MarketDataset) -> Result<Vec<MonthlyGeneration>> {
        let required = [TIMESTAMP_COLUMN, GENERATION_COLUMN];
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|c| !dataset.has_column(c))
            .collect();
        if !missing.is_empty() {
            return Err(HedgeError::missing_column(dataset.name(), &missing));
        }

        let timestamps = dataset.timestamps(TIMESTAMP_COLUMN)?;
        let generation = dataset.numeric(GENERATION_COLUMN)?;
        let periods = Self::periods(dataset)?;

        let totals = Self::aggregate(
            timestamps
                .into_iter()
                .zip(generation)
                .zip(periods)
                .map(|((ts, gen), period)| (ts, gen, period)),
        );

        info!("{}: {} monthly generation buckets", dataset.name(), totals.len());
        Ok(totals)
    }

    /// Group rows by month start and period. Rows without a timestamp are
    /// dropped; missing generation adds nothing to its bucket.
    pub fn aggregate<I>(rows: I) -> Vec<MonthlyGeneration>
    where
        I: IntoIterator<Item = (Option<NaiveDateTime>, Option<f64>, Period)>,
    {
        let mut buckets: BTreeMap<(NaiveDate, Period), f64> = BTreeMap::new();

        for (ts, gen, period) in rows {
            let Some(month) = ts.and_then(month_start) else {
                continue;
            };
            *buckets.entry((month, period)).or_insert(0.0) += gen.unwrap_or(0.0);
        }

        buckets
            .into_iter()
            .map(|((month, period), generation_mwh)| MonthlyGeneration {
                month,
                period,
                generation_mwh,
            })
            .collect()
    }

    /// Distinct simulation years, in order of first appearance.
    pub fn simulation_years(simulated: &[SimulatedMonth]) -> Vec<i32> {
        let mut years = Vec::new();
        for row in simulated {
            if !years.contains(&row.month.year()) {
                years.push(row.month.year());
            }
        }
        years
    }

    /// Copy the historical profile into every year, keeping month and day.
    pub fn replicate(profile: &[MonthlyGeneration], years: &[i32]) -> Vec<MonthlyGeneration> {
        years
            .iter()
            .flat_map(|year| {
                profile.iter().map(move |row| MonthlyGeneration {
                    month: remap_year(row.month, *year),
                    period: row.period.clone(),
                    generation_mwh: row.generation_mwh,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ts(y: i32, m: u32, d: u32, h: u32) -> Option<NaiveDateTime> {
        date(y, m, d).and_hms_opt(h, 0, 0)
    }

    #[test]
    fn test_replication_across_years() {
        let profile = vec![MonthlyGeneration {
            month: date(2024, 6, 1),
            period: Period::Peak,
            generation_mwh: 1000.0,
        }];

        let replicated = GenerationProfile::replicate(&profile, &[2026, 2027, 2028, 2029, 2030]);
        assert_eq!(replicated.len(), 5);
        for (row, year) in replicated.iter().zip(2026..=2030) {
            assert_eq!(row.month, date(year, 6, 1));
            assert_eq!(row.period, Period::Peak);
            assert_eq!(row.generation_mwh, 1000.0);
        }
    }

    #[test]
    fn test_leap_day_clamps() {
        assert_eq!(remap_year(date(2024, 2, 29), 2026), date(2026, 2, 28));
        assert_eq!(remap_year(date(2024, 2, 29), 2028), date(2028, 2, 29));
        assert_eq!(remap_year(date(2023, 7, 1), 2030), date(2030, 7, 1));
    }

    #[test]
    fn test_aggregate_by_month_and_period() {
        let totals = GenerationProfile::aggregate(vec![
            (ts(2024, 6, 1, 0), Some(10.0), Period::Peak),
            (ts(2024, 6, 15, 12), Some(5.0), Period::Peak),
            (ts(2024, 6, 2, 3), Some(7.0), Period::OffPeak),
            (ts(2024, 7, 1, 0), None, Period::OffPeak),
            (None, Some(99.0), Period::Peak),
        ]);

        assert_eq!(
            totals,
            vec![
                MonthlyGeneration {
                    month: date(2024, 6, 1),
                    period: Period::Peak,
                    generation_mwh: 15.0
                },
                MonthlyGeneration {
                    month: date(2024, 6, 1),
                    period: Period::OffPeak,
                    generation_mwh: 7.0
                },
                MonthlyGeneration {
                    month: date(2024, 7, 1),
                    period: Period::OffPeak,
                    generation_mwh: 0.0
                },
            ]
        );
    }

    #[test]
    fn test_period_column_mapping() {
        let frame = df!(
            "timestamp" => &["2024-06-01 00:00:00", "2024-06-01 01:00:00", "2024-06-01 02:00:00", "2024-06-01 03:00:00"],
            "gen" => &[1.0, 2.0, 3.0, 4.0],
            "P/OP" => &[Some("P"), Some("op"), Some("Shoulder"), None]
        )
        .unwrap();
        let dataset = MarketDataset::new("ERCOT", frame);

        let periods = GenerationProfile::periods(&dataset).unwrap();
        assert_eq!(
            periods,
            vec![
                Period::Peak,
                Period::OffPeak,
                Period::Other("shoulder".to_string()),
                Period::OffPeak
            ]
        );
    }

    #[test]
    fn test_no_period_column_defaults_off_peak() {
        let frame = df!(
            "timestamp" => &["2024-06-01 00:00:00", "2024-06-02 00:00:00"],
            "gen" => &[100.0, 50.0]
        )
        .unwrap();
        let dataset = MarketDataset::new("CAISO", frame);

        let totals = GenerationProfile::monthly_totals(&dataset).unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].period, Period::OffPeak);
        assert_eq!(totals[0].generation_mwh, 150.0);
    }

    #[test]
    fn test_missing_generation_column() {
        let frame = df!("timestamp" => &["2024-06-01 00:00:00"]).unwrap();
        let err = GenerationProfile::monthly_totals(&MarketDataset::new("MISO", frame)).unwrap_err();
        assert!(err.is_skippable());
    }
}
