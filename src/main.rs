use anyhow::{Context, Result};
use shop_etl::config::PipelineConfig;
use shop_etl::ingest::load_table;
use shop_etl::models::Dataset;
use shop_etl::pipeline::{CleaningSettings, assemble_outputs, clean_dataset, write_outputs};
use shop_etl::processor::CleanedTable;
use shop_etl::storage::{LocalStorage, StorageManager};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config_path = PipelineConfig::resolve_path();
    let config = PipelineConfig::from_file(&config_path)
        .context("Failed to load pipeline configuration")?;
    info!("🚀 Starting e-commerce cleaning pipeline ({})", config_path.display());

    let settings = CleaningSettings::from(&config);
    let mut tasks = Vec::new();
    for dataset in Dataset::ALL {
        let Some(path) = config.input_for(dataset) else {
            warn!("No input configured for {}, skipping", dataset);
            continue;
        };
        let path = path.to_path_buf();

        tasks.push((
            dataset,
            tokio::task::spawn_blocking(move || -> Result<CleanedTable> {
                let raw = load_table(&path)?;
                info!("\n=== Cleaning {} ({} rows from {}) ===", dataset, raw.height(), path.display());
                clean_dataset(dataset, &raw, settings)
            }),
        ));
    }

    let mut results = Vec::new();
    for (dataset, task) in tasks {
        let result = task
            .await
            .with_context(|| format!("Cleaning task for {} did not complete", dataset))?;
        results.push((dataset, result));
    }

    // Clean everything before writing anything: a schema error in one dataset
    // must not leave partial output behind.
    let outputs = assemble_outputs(results)?;

    let storage = LocalStorage::new(StorageManager::new(&config.output.directory), config.output.format);
    let written = write_outputs(&storage, &outputs, config.output.write_reports)?;

    info!("🎉 Pipeline completed: {} tables written", written);
    Ok(())
}
