use anyhow::{Context, Result};
use shop_etl::config::PipelineConfig;
use shop_etl::ingest::load_table;
use shop_etl::models::Dataset;
use shop_etl::processor::{ColumnProfile, profile_table};
use shop_etl::storage::{LocalStorage, StorageManager};
use tracing::{info, warn};

/// Profiles every configured raw export without cleaning it.
fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let config = PipelineConfig::from_file(PipelineConfig::resolve_path())
        .context("Failed to load pipeline configuration")?;

    let mut profiles: Vec<ColumnProfile> = Vec::new();
    for dataset in Dataset::ALL {
        let Some(path) = config.input_for(dataset) else {
            continue;
        };
        let raw = load_table(path)?;
        info!("=== {} ({} rows x {} columns) ===", dataset, raw.height(), raw.width());

        for profile in profile_table(dataset.name(), &raw)? {
            info!(
                "  {:<22} {:>6.2}% null | {:>5} unique | {:?} | samples {:?}",
                profile.column, profile.null_percentage, profile.unique_count, profile.types, profile.sample_values
            );
            if !profile.notes.is_empty() {
                warn!("  ⚠️ {}: {}", profile.column, profile.notes);
            }
            profiles.push(profile);
        }
    }

    let storage = LocalStorage::new(StorageManager::new(&config.output.directory), config.output.format);
    storage.store_json("raw_profile", &profiles)?;
    Ok(())
}
