use crate::error::{HedgeError, Result};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// An output directory that only comes into existence when written to.
#[derive(Debug, Clone)]
pub struct OutputSink {
    dir: PathBuf,
}

impl OutputSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for `file_name`, creating the directory first.
    pub fn prepare(&self, file_name: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| HedgeError::io(&self.dir, e))?;
        Ok(self.dir.join(file_name))
    }

    /// Overwrite `file_name` with one CSV row per record.
    pub fn write_records<T: Serialize>(&self, file_name: &str, records: &[T]) -> Result<PathBuf> {
        let path = self.prepare(file_name)?;
        let mut writer = csv::Writer::from_path(&path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush().map_err(|e| HedgeError::io(&path, e))?;

        info!("Saved {} rows -> {}", records.len(), path.display());
        Ok(path)
    }

    /// Like [`write_records`](Self::write_records), but the header is always
    /// written so an empty table still overwrites the file.
    pub fn write_table<T: Serialize>(&self, file_name: &str, header: &[&str], records: &[T]) -> Result<PathBuf> {
        let path = self.prepare(file_name)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(&path)?;
        writer.write_record(header)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush().map_err(|e| HedgeError::io(&path, e))?;

        info!("Saved {} rows -> {}", records.len(), path.display());
        Ok(path)
    }

    /// Overwrite `file_name` with a header row and a single value row.
    pub fn write_row(&self, file_name: &str, header: &[String], values: &[String]) -> Result<PathBuf> {
        let path = self.prepare(file_name)?;
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(header)?;
        writer.write_record(values)?;
        writer.flush().map_err(|e| HedgeError::io(&path, e))?;
        Ok(path)
    }
}
