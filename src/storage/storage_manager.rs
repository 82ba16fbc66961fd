use crate::models::OutputFormat;
use chrono::Utc;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Lays out everything one pipeline run writes under the output directory:
///
/// ```text
/// <root>/clean/<YYYY/MM/DD>/<run_id>/<table>.<ext>
/// <root>/reports/<YYYY/MM/DD>/<run_id>/<name>.json
/// ```
#[derive(Debug, Clone)]
pub struct StorageManager {
    root: PathBuf,
    date: String,
    run_id: Uuid,
}

impl StorageManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StorageManager {
            root: root.into(),
            date: Utc::now().format("%Y/%m/%d").to_string(),
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn generate_clean_path(&self, table: &str, format: OutputFormat) -> PathBuf {
        self.run_dir("clean").join(format!("{}.{}", table, format.extension()))
    }

    pub fn generate_report_path(&self, name: &str) -> PathBuf {
        self.run_dir("reports").join(format!("{}.json", name))
    }

    fn run_dir(&self, area: &str) -> PathBuf {
        self.root.join(area).join(&self.date).join(self.run_id.to_string())
    }
}
