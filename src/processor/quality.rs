use anyhow::Result;
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// A cleaned table together with the report describing how it got there.
#[derive(Debug, Clone)]
pub struct CleanedTable {
    pub frame: DataFrame,
    pub report: CleaningReport,
}

/// Completeness statistics for one column of a cleaned table.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ColumnQuality {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
    pub null_percentage: f64,
    pub unique_count: usize,
}

/// Before/after summary of a cleaning run plus named anomaly counters.
#[derive(Debug, Clone, Serialize, Default)]
pub struct CleaningReport {
    pub dataset: String,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: usize,
    pub columns_after: usize,
    pub columns: Vec<ColumnQuality>,
    pub anomalies: BTreeMap<String, usize>,
}

/// Counters that indicate values were silently absorbed rather than mapped.
const WARN_COUNTERS: [&str; 2] = ["status_defaulted_to_pending", "order_status_defaulted_to_pending"];

impl CleaningReport {
    pub fn new(dataset: &str, raw: &DataFrame) -> Self {
        CleaningReport {
            dataset: dataset.to_string(),
            rows_before: raw.height(),
            columns_before: raw.width(),
            ..Default::default()
        }
    }

    /// Adds `count` to a named counter. Zero counts are still recorded so the
    /// report shape is stable across runs.
    pub fn record(&mut self, counter: &str, count: usize) {
        *self.anomalies.entry(counter.to_string()).or_insert(0) += count;
    }

    pub fn anomaly(&self, counter: &str) -> usize {
        self.anomalies.get(counter).copied().unwrap_or(0)
    }

    pub fn rows_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnQuality> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Fills the after-cleaning shape and per-column statistics.
    pub fn finish(&mut self, cleaned: &DataFrame) -> Result<()> {
        self.rows_after = cleaned.height();
        self.columns_after = cleaned.width();
        self.columns = column_quality(cleaned)?;
        Ok(())
    }

    pub fn log_summary(&self) {
        info!("==================================================");
        info!("DATA CLEANING SUMMARY: {}", self.dataset);
        info!("==================================================");
        info!(
            "Original shape: ({}, {}) -> cleaned shape: ({}, {})",
            self.rows_before, self.columns_before, self.rows_after, self.columns_after
        );
        info!(
            "Rows removed: {}, columns removed: {}",
            self.rows_removed(),
            self.columns_before as i64 - self.columns_after as i64
        );

        for column in self.columns.iter().filter(|c| c.null_count > 0) {
            info!(
                "  {:<22}: {:>5.1}% missing | {} unique | {}",
                column.name, column.null_percentage, column.unique_count, column.dtype
            );
        }

        for (counter, count) in &self.anomalies {
            if *count > 0 && WARN_COUNTERS.contains(&counter.as_str()) {
                warn!("⚠️ {}: {}", counter, count);
            } else {
                info!("  {}: {}", counter, count);
            }
        }
    }
}

pub fn column_quality(df: &DataFrame) -> Result<Vec<ColumnQuality>> {
    let height = df.height();
    let mut stats = Vec::with_capacity(df.width());

    for column in df.get_columns() {
        let null_count = column.null_count();
        let null_percentage = if height == 0 {
            0.0
        } else {
            round2(null_count as f64 / height as f64 * 100.0)
        };
        // polars counts null as a distinct value; the report does not.
        let unique_count = column
            .as_materialized_series()
            .n_unique()?
            .saturating_sub(usize::from(null_count > 0));

        stats.push(ColumnQuality {
            name: column.name().to_string(),
            dtype: column.dtype().to_string(),
            null_count,
            null_percentage,
            unique_count,
        });
    }

    Ok(stats)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
