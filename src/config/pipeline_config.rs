use crate::models::{Dataset, OutputFormat};
use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "configs/pipeline.toml";
pub const CONFIG_PATH_ENV: &str = "PIPELINE_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub input: InputSection,
    pub output: OutputSection,
    #[serde(default)]
    pub cleaning: CleaningSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSection {
    pub customers: Option<PathBuf>,
    pub orders: Option<PathBuf>,
    pub products: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    pub directory: PathBuf,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_write_reports")]
    pub write_reports: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleaningSection {
    /// Year used for age/birth-date reconciliation. Defaults to the current year.
    pub reference_year: Option<i32>,
    /// Seed for tracking-number synthesis; unseeded runs are seeded from OS entropy.
    pub tracking_seed: Option<u64>,
}

fn default_write_reports() -> bool {
    true
}

impl PipelineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config file: {}", path.display()))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse pipeline config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves the config path from `PIPELINE_CONFIG`, falling back to the default.
    pub fn resolve_path() -> PathBuf {
        env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn validate(&self) -> Result<()> {
        if Dataset::ALL.iter().all(|d| self.input_for(*d).is_none()) {
            return Err(anyhow!("Pipeline config declares no input files"));
        }
        if self.output.directory.as_os_str().is_empty() {
            return Err(anyhow!("Output directory cannot be empty"));
        }
        Ok(())
    }

    pub fn input_for(&self, dataset: Dataset) -> Option<&Path> {
        match dataset {
            Dataset::Customers => self.input.customers.as_deref(),
            Dataset::Orders => self.input.orders.as_deref(),
            Dataset::Products => self.input.products.as_deref(),
        }
    }

    pub fn reference_year(&self) -> i32 {
        self.cleaning
            .reference_year
            .unwrap_or_else(|| Local::now().year())
    }
}
