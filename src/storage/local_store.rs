use crate::models::OutputFormat;
use crate::storage::StorageManager;
use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes cleaned tables and JSON documents to the local filesystem.
pub struct LocalStorage {
    paths: StorageManager,
    format: OutputFormat,
}

impl LocalStorage {
    pub fn new(paths: StorageManager, format: OutputFormat) -> Self {
        LocalStorage { paths, format }
    }

    pub fn paths(&self) -> &StorageManager {
        &self.paths
    }

    /// Writes `df` in the configured format and returns where it went.
    pub fn store_table(&self, table: &str, df: &DataFrame) -> Result<PathBuf> {
        let path = self.paths.generate_clean_path(table, self.format);
        write_table(&path, df, self.format)?;
        info!("Stored {} table ({} rows): {}", table, df.height(), path.display());
        Ok(path)
    }

    pub fn store_json<T: Serialize>(&self, name: &str, document: &T) -> Result<PathBuf> {
        let path = self.paths.generate_report_path(name);
        ensure_parent(&path)?;
        let content = serde_json::to_string_pretty(document)
            .with_context(|| format!("Failed to serialize {}", name))?;
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Stored report: {}", path.display());
        Ok(path)
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

/// JSON output is an array of records, the shape the loader reads back.
pub fn write_table(path: &Path, df: &DataFrame, format: OutputFormat) -> Result<()> {
    ensure_parent(path)?;
    let mut file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    // Writers take `&mut DataFrame`; the caller's table stays untouched.
    let mut df = df.clone();

    match format {
        OutputFormat::Json => {
            JsonWriter::new(&mut file)
                .with_json_format(JsonFormat::Json)
                .finish(&mut df)?;
        }
        OutputFormat::Csv => {
            CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        }
        OutputFormat::Parquet => {
            ParquetWriter::new(&mut file).finish(&mut df)?;
        }
    }
    Ok(())
}
