//! Raw-table profiling, run before cleaning to see what a source export looks like.

use crate::processor::frame::{column_names, text_values};
use crate::processor::quality::round2;
use anyhow::Result;
use polars::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

const SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ColumnProfile {
    pub dataset: String,
    pub column: String,
    /// Kinds of value observed, in first-seen order: `int`, `float`, `bool` or `str`.
    pub types: Vec<String>,
    pub sample_values: Vec<String>,
    pub unique_count: usize,
    pub null_percentage: f64,
    pub notes: String,
}

fn value_kind(raw: &str) -> &'static str {
    let trimmed = raw.trim();
    if trimmed.parse::<i64>().is_ok() {
        "int"
    } else if trimmed.parse::<f64>().is_ok() {
        "float"
    } else if trimmed == "true" || trimmed == "false" {
        "bool"
    } else {
        "str"
    }
}

pub fn profile_table(dataset: &str, df: &DataFrame) -> Result<Vec<ColumnProfile>> {
    let mut profiles = Vec::with_capacity(df.width());
    for name in column_names(df) {
        profiles.push(profile_column(dataset, &name, &text_values(df, &name)?));
    }
    Ok(profiles)
}

fn profile_column(dataset: &str, column: &str, values: &[Option<String>]) -> ColumnProfile {
    let present: Vec<&str> = values.iter().flatten().map(String::as_str).collect();

    let mut types: Vec<String> = Vec::new();
    for kind in present.iter().map(|v| value_kind(v)) {
        if !types.iter().any(|t| t == kind) {
            types.push(kind.to_string());
        }
    }

    let mut seen = HashSet::new();
    let distinct: Vec<&str> = present.iter().copied().filter(|v| seen.insert(*v)).collect();
    let folded: BTreeSet<String> = distinct.iter().map(|v| v.to_lowercase()).collect();

    let null_percentage = if values.is_empty() {
        0.0
    } else {
        round2((values.len() - present.len()) as f64 / values.len() as f64 * 100.0)
    };

    let mut notes = Vec::new();
    if folded.len() != distinct.len() {
        notes.push("Possible casing inconsistency.".to_string());
    }
    if types.len() > 1 {
        notes.push(format!("Multiple types found: {:?}.", types));
    }

    ColumnProfile {
        dataset: dataset.to_string(),
        column: column.to_string(),
        sample_values: distinct.iter().take(SAMPLE_SIZE).map(|v| v.to_string()).collect(),
        unique_count: distinct.len(),
        types,
        null_percentage,
        notes: notes.join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::frame::frame_from_text_columns;

    fn text(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn test_profile_flags_casing_and_mixed_types() {
        let df = frame_from_text_columns(vec![
            ("status", text(&[Some("active"), Some("ACTIVE"), None, Some("pending")])),
            ("zip", text(&[Some("10001"), Some("10001.0"), Some("n/a"), None])),
        ])
        .unwrap();

        let profiles = profile_table("customers", &df).unwrap();
        let status = &profiles[0];
        assert_eq!(status.types, vec!["str"]);
        assert_eq!(status.unique_count, 3);
        assert_eq!(status.null_percentage, 25.0);
        assert_eq!(status.notes, "Possible casing inconsistency.");

        let zip = &profiles[1];
        assert_eq!(zip.types, vec!["int", "float", "str"]);
        assert!(zip.notes.starts_with("Multiple types found"));
        assert_eq!(zip.sample_values, vec!["10001", "10001.0", "n/a"]);
    }

    #[test]
    fn test_samples_are_capped() {
        let values: Vec<Option<String>> = (0..8).map(|i| Some(format!("v{i}"))).collect();
        let profile = profile_column("products", "sku", &values);
        assert_eq!(profile.sample_values.len(), SAMPLE_SIZE);
        assert_eq!(profile.unique_count, 8);
        assert!(profile.notes.is_empty());
    }
}
