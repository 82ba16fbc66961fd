use crate::processor::frame::frame_from_text_columns;
use anyhow::{Context, Result, anyhow};
use polars::prelude::*;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Turns a JSON export (an array of flat or nested objects) into a frame of
/// string columns.
///
/// Every scalar is kept as its textual form so the cleaners see the same thing
/// whether the export came from JSON or CSV. Floats keep their decimal point
/// (`10001.0`), nested objects become `parent.child` columns, and arrays are
/// kept as their JSON text.
pub struct JsonFlattener;

impl JsonFlattener {
    pub fn new() -> Self {
        JsonFlattener
    }

    pub fn load_file(&self, path: &Path) -> Result<DataFrame> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read JSON file: {}", path.display()))?;
        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON file: {}", path.display()))?;
        let records = value
            .as_array()
            .ok_or_else(|| anyhow!("{} does not contain a JSON array of records", path.display()))?;
        self.flatten_to_dataframe(records)
    }

    pub fn flatten_to_dataframe(&self, json_data: &[Value]) -> Result<DataFrame> {
        let mut columns: Vec<String> = Vec::new();
        let mut records = Vec::with_capacity(json_data.len());
        let mut skipped = 0;

        for (index, item) in json_data.iter().enumerate() {
            let Some(object) = item.as_object() else {
                skipped += 1;
                warn!("Skipping record at index {}: expected an object, got {}", index, kind_of(item));
                continue;
            };

            let mut record = HashMap::new();
            flatten_object("", object, &mut record);
            // Column order follows first appearance across records.
            for key in flattened_keys("", object) {
                if !columns.contains(&key) {
                    columns.push(key);
                }
            }
            records.push(record);
        }

        info!(
            "Flattened {} records into {} columns ({} skipped)",
            records.len(),
            columns.len(),
            skipped
        );

        self.records_to_dataframe(&columns, records)
    }

    fn records_to_dataframe(
        &self,
        columns: &[String],
        mut records: Vec<HashMap<String, Option<String>>>,
    ) -> Result<DataFrame> {
        let data: Vec<(&str, Vec<Option<String>>)> = columns
            .iter()
            .map(|name| {
                let values = records
                    .iter_mut()
                    .map(|record| record.remove(name).flatten())
                    .collect();
                (name.as_str(), values)
            })
            .collect();
        frame_from_text_columns(data)
    }
}

impl Default for JsonFlattener {
    fn default() -> Self {
        Self::new()
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn flatten_object(prefix: &str, object: &Map<String, Value>, record: &mut HashMap<String, Option<String>>) {
    for (key, value) in object {
        let name = join_key(prefix, key);
        match value {
            Value::Object(nested) => flatten_object(&name, nested, record),
            other => {
                record.insert(name, scalar_text(other));
            }
        }
    }
}

fn flattened_keys(prefix: &str, object: &Map<String, Value>) -> Vec<String> {
    let mut keys = Vec::new();
    for (key, value) in object {
        let name = join_key(prefix, key);
        match value {
            Value::Object(nested) => keys.extend(flattened_keys(&name, nested)),
            _ => keys.push(name),
        }
    }
    keys
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::frame::text_values;
    use serde_json::json;

    #[test]
    fn test_flatten_mixed_records() {
        let data = vec![
            json!({"customer_id": 1, "zip_code": 10001.0, "is_vip": true, "email": null}),
            json!({"customer_id": 2, "zip_code": "90001", "address": {"city": "nyc"}}),
            json!("not a record"),
        ];

        let df = JsonFlattener::new().flatten_to_dataframe(&data).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(
            df.get_column_names().iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            vec!["customer_id", "zip_code", "is_vip", "email", "address.city"]
        );
        assert_eq!(
            text_values(&df, "zip_code").unwrap(),
            vec![Some("10001.0".to_string()), Some("90001".to_string())]
        );
        assert_eq!(text_values(&df, "is_vip").unwrap(), vec![Some("true".to_string()), None]);
        assert_eq!(text_values(&df, "email").unwrap(), vec![None, None]);
        assert_eq!(text_values(&df, "address.city").unwrap(), vec![None, Some("nyc".to_string())]);
    }

    #[test]
    fn test_arrays_kept_as_json_text() {
        let data = vec![json!({"tags": ["a", "b"]})];
        let df = JsonFlattener::new().flatten_to_dataframe(&data).unwrap();
        assert_eq!(text_values(&df, "tags").unwrap(), vec![Some("[\"a\",\"b\"]".to_string())]);
    }
}
