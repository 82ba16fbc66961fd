//! Column-level helpers over polars frames.
//!
//! Cleaners read a column into a plain `Vec<Option<T>>`, apply per-value rules,
//! and write the result back under the same name. Every read goes through
//! [`text_values`] so raw exports with mixed dtypes (strings from CSV, numbers
//! and booleans from JSON) look the same to the rules.

use crate::error::SchemaError;
use anyhow::Result;
use polars::prelude::*;
use std::collections::HashSet;

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// Fails with [`SchemaError::MissingColumn`] on the first absent column.
pub fn require_columns(df: &DataFrame, dataset: &str, columns: &[&str]) -> Result<()> {
    for name in columns {
        if !has_column(df, name) {
            return Err(SchemaError::missing_column(dataset, name).into());
        }
    }
    Ok(())
}

/// Renders a cell the way it would appear in a text export.
///
/// Floats keep their decimal point (`10001.0`), which is what the zip-code
/// artifact stripping in the customer cleaner expects to see.
pub fn any_to_text(value: AnyValue<'_>) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => Some(s.to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        AnyValue::Boolean(b) => Some(b.to_string()),
        AnyValue::Int8(v) => Some(v.to_string()),
        AnyValue::Int16(v) => Some(v.to_string()),
        AnyValue::Int32(v) => Some(v.to_string()),
        AnyValue::Int64(v) => Some(v.to_string()),
        AnyValue::UInt8(v) => Some(v.to_string()),
        AnyValue::UInt16(v) => Some(v.to_string()),
        AnyValue::UInt32(v) => Some(v.to_string()),
        AnyValue::UInt64(v) => Some(v.to_string()),
        AnyValue::Float32(v) => float_to_text(f64::from(v)),
        AnyValue::Float64(v) => float_to_text(v),
        other => Some(other.to_string()),
    }
}

fn float_to_text(v: f64) -> Option<String> {
    if v.is_nan() { None } else { Some(format!("{v:?}")) }
}

pub fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)?;
    let mut values = Vec::with_capacity(column.len());
    for idx in 0..column.len() {
        values.push(any_to_text(column.get(idx)?));
    }
    Ok(values)
}

/// Like [`text_values`], but an absent column reads as all-missing.
pub fn optional_text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    if has_column(df, name) {
        text_values(df, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

/// Lenient numeric parse: anything that is not a finite-or-infinite number is missing.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| !v.is_nan())
}

pub fn number_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    Ok(text_values(df, name)?
        .into_iter()
        .map(|v| v.as_deref().and_then(parse_number))
        .collect())
}

pub fn optional_number_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    if has_column(df, name) {
        number_values(df, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

pub fn bool_values(df: &DataFrame, name: &str) -> Result<Vec<Option<bool>>> {
    Ok(text_values(df, name)?
        .into_iter()
        .map(|v| match v.as_deref() {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        })
        .collect())
}

pub fn set_text(df: &mut DataFrame, name: &str, values: Vec<Option<String>>) -> Result<()> {
    df.with_column(Column::new(name.into(), values))?;
    Ok(())
}

pub fn set_numbers(df: &mut DataFrame, name: &str, values: Vec<Option<f64>>) -> Result<()> {
    df.with_column(Column::new(name.into(), values))?;
    Ok(())
}

pub fn set_integers(df: &mut DataFrame, name: &str, values: Vec<Option<i64>>) -> Result<()> {
    df.with_column(Column::new(name.into(), values))?;
    Ok(())
}

pub fn set_bools(df: &mut DataFrame, name: &str, values: Vec<Option<bool>>) -> Result<()> {
    df.with_column(Column::new(name.into(), values))?;
    Ok(())
}

/// Rewrites a text column value by value; missing cells stay missing.
pub fn map_text<F>(df: &mut DataFrame, name: &str, f: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let values = text_values(df, name)?
        .into_iter()
        .map(|v| v.as_deref().and_then(|s| f(s)))
        .collect();
    set_text(df, name, values)
}

/// Number of cells that were present before a rule and missing after it.
pub fn count_lost<A, B>(before: &[Option<A>], after: &[Option<B>]) -> usize {
    before
        .iter()
        .zip(after)
        .filter(|(b, a)| b.is_some() && a.is_none())
        .count()
}

/// Names of all columns, owned so the frame can be mutated while iterating.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

/// Drops a column if present; returns whether anything was removed.
pub fn drop_if_present(df: &mut DataFrame, name: &str) -> Result<bool> {
    if has_column(df, name) {
        df.drop_in_place(name)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Keeps the first row for every distinct key; rows whose key is `None` are kept
/// or dropped according to `keep_missing`. Returns the number of rows removed.
pub fn dedup_first_by<K>(df: &mut DataFrame, keys: Vec<Option<K>>, keep_missing: bool) -> Result<usize>
where
    K: std::hash::Hash + Eq,
{
    let mut seen = HashSet::with_capacity(keys.len());
    let keep: Vec<bool> = keys
        .into_iter()
        .map(|key| match key {
            Some(key) => seen.insert(key),
            None => keep_missing,
        })
        .collect();

    let removed = keep.iter().filter(|k| !**k).count();
    if removed > 0 {
        let mask = BooleanChunked::new("keep".into(), keep);
        *df = df.filter(&mask)?;
    }
    Ok(removed)
}

/// Builds a frame of string columns; used by ingestion and by tests.
pub fn frame_from_text_columns(columns: Vec<(&str, Vec<Option<String>>)>) -> Result<DataFrame> {
    let columns: Vec<Column> = columns
        .into_iter()
        .map(|(name, values)| Column::new(name.into(), values))
        .collect();
    Ok(DataFrame::new(columns)?)
}
