use anyhow::{Context, Result};
use chrono::{NaiveDateTime, TimeDelta};
use glob::glob;
use hedge_calculator::data_loader::{parse_number, parse_timestamp};
use log::{debug, warn};
use regex::Regex;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One raw sheet export held as text cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn cell(&self, row: usize, col: usize) -> &str {
        self.rows[row].get(col).map(String::as_str).unwrap_or("")
    }
}

/// `" Off Peak "` -> `"off_peak"`
pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

pub struct SheetCleaner {
    raw_dir: PathBuf,
    output_dir: PathBuf,
    currency: Regex,
}

impl SheetCleaner {
    pub fn new(raw_dir: PathBuf, output_dir: PathBuf) -> Result<Self> {
        Ok(Self {
            raw_dir,
            output_dir,
            currency: Regex::new(r"[\$,()]")?,
        })
    }

    /// Clean every `*.csv` sheet export in the raw directory.
    pub fn clean_all(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.raw_dir.join("*.csv");
        let pattern = pattern.to_str().context("raw directory path is not UTF-8")?;
        let files: Vec<PathBuf> = glob(pattern)?.filter_map(|entry| entry.ok()).collect();

        println!("🧹 Cleaning {} sheet exports from {}", files.len(), self.raw_dir.display());

        let mut written = Vec::new();
        for file in files {
            let sheet_name = file
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("sheet")
                .to_string();

            match self.clean_file(&file, &sheet_name) {
                Ok(path) => {
                    println!("  ✅ {} -> {}", sheet_name, path.display());
                    written.push(path);
                }
                Err(e) => println!("  ❌ {}: {:#}", sheet_name, e),
            }
        }

        Ok(written)
    }

    pub fn clean_file(&self, path: &Path, sheet_name: &str) -> Result<PathBuf> {
        let sheet = read_sheet(path)?;
        let cleaned = self.clean(sheet);

        std::fs::create_dir_all(&self.output_dir)?;
        let out_path = self
            .output_dir
            .join(format!("{}_clean.csv", sheet_name).replace(' ', "_"));
        write_sheet(&cleaned, &out_path)?;
        Ok(out_path)
    }

    pub fn clean(&self, mut sheet: Sheet) -> Sheet {
        sheet.headers = sheet.headers.iter().map(|h| normalize_header(h)).collect();
        self.strip_currency(&mut sheet);
        add_timestamp(&mut sheet);
        sort_by_timestamp(&mut sheet);
        sheet
    }

    /// Strip `$ , ( )` from every cell of a text column that mentions `$`.
    fn strip_currency(&self, sheet: &mut Sheet) {
        for col in 0..sheet.headers.len() {
            let cells: Vec<&str> = (0..sheet.rows.len()).map(|row| sheet.cell(row, col)).collect();
            let is_text = cells.iter().any(|c| !c.trim().is_empty() && parse_number(c).is_none());
            let has_dollar = cells.iter().any(|c| c.contains('$'));

            if !(is_text && has_dollar) {
                continue;
            }

            debug!("stripping currency formatting from '{}'", sheet.headers[col]);
            for row in sheet.rows.iter_mut() {
                if let Some(cell) = row.get_mut(col) {
                    *cell = self.currency.replace_all(cell, "").into_owned();
                }
            }
        }
    }
}

/// `date + (he - 1) hours`; `None` when the offset is out of range.
fn hour_ending_timestamp(date: NaiveDateTime, he: f64) -> Option<NaiveDateTime> {
    let minutes = ((he - 1.0) * 60.0).round();
    if !minutes.is_finite() || minutes.abs() > i64::MAX as f64 {
        return None;
    }
    date.checked_add_signed(TimeDelta::try_minutes(minutes as i64)?)
}

/// `timestamp = date + (he - 1) hours` when both `date` and `he` exist.
fn add_timestamp(sheet: &mut Sheet) {
    let (Some(date_col), Some(he_col)) = (sheet.column_index("date"), sheet.column_index("he")) else {
        return;
    };

    let stamps: Vec<String> = (0..sheet.rows.len())
        .map(|row| {
            let date = parse_timestamp(sheet.cell(row, date_col));
            let he = parse_number(sheet.cell(row, he_col));
            match (date, he) {
                (Some(date), Some(he)) => hour_ending_timestamp(date, he)
                    .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
                    .unwrap_or_default(),
                _ => String::new(),
            }
        })
        .collect();

    if stamps.iter().all(|s| s.is_empty()) {
        warn!("date/he present but no row converted to a timestamp");
        return;
    }

    let ts_col = match sheet.column_index("timestamp") {
        Some(idx) => idx,
        None => {
            sheet.headers.push("timestamp".to_string());
            sheet.headers.len() - 1
        }
    };

    let width = sheet.headers.len();
    for (row, stamp) in sheet.rows.iter_mut().zip(stamps) {
        row.resize(width.max(row.len()), String::new());
        row[ts_col] = stamp;
    }
}

/// Stable sort on `timestamp`; rows that don't parse go last.
fn sort_by_timestamp(sheet: &mut Sheet) {
    let Some(ts_col) = sheet.column_index("timestamp") else {
        return;
    };

    sheet.rows.sort_by(|a, b| {
        let ta = a.get(ts_col).and_then(|c| parse_timestamp(c));
        let tb = b.get(ts_col).and_then(|c| parse_timestamp(c));
        match (ta, tb) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

pub fn read_sheet(path: &Path) -> Result<Sheet> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let headers = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(|c| c.to_string()).collect());
    }

    Ok(Sheet { headers, rows })
}

pub fn write_sheet(sheet: &Sheet, path: &Path) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    writer.write_record(&sheet.headers)?;
    for row in &sheet.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn clean_all_sheets(raw_dir: &Path, output_dir: &Path) -> Result<()> {
    let cleaner = SheetCleaner::new(raw_dir.to_path_buf(), output_dir.to_path_buf())?;
    let written = cleaner.clean_all()?;
    println!("\n✅ Cleaned {} sheets into {}", written.len(), output_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(headers: &[&str], rows: &[&[&str]]) -> Sheet {
        Sheet {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    fn cleaner() -> SheetCleaner {
        SheetCleaner::new(PathBuf::from("raw"), PathBuf::from("clean")).unwrap()
    }

    #[test]
    fn test_header_normalization() {
        assert_eq!(normalize_header(" RT Hub "), "rt_hub");
        assert_eq!(normalize_header("Off Peak"), "off_peak");
        assert_eq!(normalize_header("P/OP"), "p/op");
    }

    #[test]
    fn test_currency_columns_stripped() {
        let cleaned = cleaner().clean(sheet(
            &["Peak", "Gen"],
            &[&["$1,250.50", "10"], &["($3.00)", "12"], &["", "14"]],
        ));

        assert_eq!(cleaned.headers, vec!["peak", "gen"]);
        assert_eq!(cleaned.rows[0][0], "1250.50");
        assert_eq!(cleaned.rows[1][0], "3.00");
        assert_eq!(cleaned.rows[2][0], "");
        assert_eq!(cleaned.rows[0][1], "10");
    }

    #[test]
    fn test_timestamp_from_date_and_hour_ending() {
        let cleaned = cleaner().clean(sheet(
            &["Date", "HE", "RT Hub"],
            &[
                &["2024-06-02", "1", "30"],
                &["2024-06-01", "24", "28"],
                &["2024-06-01", "1", "25"],
                &["bad", "2", "99"],
            ],
        ));

        let ts = cleaned.column_index("timestamp").unwrap();
        let stamps: Vec<&str> = cleaned.rows.iter().map(|r| r[ts].as_str()).collect();
        assert_eq!(
            stamps,
            vec!["2024-06-01 00:00:00", "2024-06-01 23:00:00", "2024-06-02 00:00:00", ""]
        );
    }

    #[test]
    fn test_out_of_range_hour_ending_left_empty() {
        let cleaned = cleaner().clean(sheet(
            &["Date", "HE"],
            &[&["2024-06-01", "1e12"], &["2024-06-01", "inf"], &["2024-06-01", "2"]],
        ));

        let ts = cleaned.column_index("timestamp").unwrap();
        let stamps: Vec<&str> = cleaned.rows.iter().map(|r| r[ts].as_str()).collect();
        assert_eq!(stamps, vec!["2024-06-01 01:00:00", "", ""]);
    }

    #[test]
    fn test_clean_file_round_trip_names() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw");
        std::fs::create_dir_all(&raw).unwrap();
        std::fs::write(raw.join("West Hub.csv"), "Date,HE,Gen\n2024-01-01,1,5\n").unwrap();

        let cleaner = SheetCleaner::new(raw.clone(), dir.path().join("clean_data")).unwrap();
        let written = cleaner.clean_all().unwrap();

        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("West_Hub_clean.csv"));
        let reread = read_sheet(&written[0]).unwrap();
        assert_eq!(reread.headers, vec!["date", "he", "gen", "timestamp"]);
        assert_eq!(reread.rows[0][3], "2024-01-01 00:00:00");
    }
}
