pub mod csv_loader;
pub mod json_flattener;

pub use csv_loader::load_csv;
pub use json_flattener::JsonFlattener;

use anyhow::{Result, bail};
use polars::prelude::DataFrame;
use std::path::Path;

/// Loads a raw export, choosing the reader from the file extension.
pub fn load_table(path: &Path) -> Result<DataFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "json" => JsonFlattener::new().load_file(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported input format '{}' for {}", other, path.display()),
    }
}
