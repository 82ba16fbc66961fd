use crate::config::PipelineConfig;
use crate::models::Dataset;
use crate::processor::{
    CleanedTable, CustomerCleaner, OrderCleaner, ProductCleaner, split_order_tables, suppliers_table,
};
use crate::reporting::{MetricInputs, PipelineMetrics};
use crate::storage::LocalStorage;
use anyhow::{Context, Result};
use polars::prelude::DataFrame;
use std::collections::HashMap;
use tracing::{info, warn};

/// Knobs every cleaner run needs, resolved once from the config.
#[derive(Debug, Clone, Copy)]
pub struct CleaningSettings {
    pub reference_year: i32,
    pub tracking_seed: Option<u64>,
}

impl From<&PipelineConfig> for CleaningSettings {
    fn from(config: &PipelineConfig) -> Self {
        CleaningSettings {
            reference_year: config.reference_year(),
            tracking_seed: config.cleaning.tracking_seed,
        }
    }
}

/// Everything a run writes, assembled before the first file is touched.
pub struct PipelineOutputs {
    pub cleaned: HashMap<Dataset, CleanedTable>,
    pub tables: Vec<(String, DataFrame)>,
}

impl PipelineOutputs {
    /// Metrics need all three datasets; `None` otherwise.
    pub fn metric_inputs(&self) -> Option<MetricInputs<'_>> {
        let table = |name: &str| self.tables.iter().find(|(n, _)| n == name).map(|(_, df)| df);
        Some(MetricInputs {
            customers: &self.cleaned.get(&Dataset::Customers)?.frame,
            orders: table("orders")?,
            order_items: table("order_items")?,
            products: &self.cleaned.get(&Dataset::Products)?.frame,
        })
    }
}

pub fn clean_dataset(dataset: Dataset, raw: &DataFrame, settings: CleaningSettings) -> Result<CleanedTable> {
    match dataset {
        Dataset::Customers => CustomerCleaner::new(settings.reference_year)?.clean(raw),
        Dataset::Orders => OrderCleaner::new(settings.tracking_seed).clean(raw),
        Dataset::Products => ProductCleaner::new()?.clean(raw),
    }
}

/// Fails on the first dataset that failed to clean or split, so a bad dataset
/// leaves nothing to write.
pub fn assemble_outputs(results: Vec<(Dataset, Result<CleanedTable>)>) -> Result<PipelineOutputs> {
    let mut cleaned = HashMap::new();
    for (dataset, result) in results {
        let table = result.with_context(|| format!("Failed to clean {}", dataset))?;
        cleaned.insert(dataset, table);
    }

    let tables = build_outputs(&cleaned)?;
    Ok(PipelineOutputs { cleaned, tables })
}

/// Output tables by name: each cleaned table plus the loader-shaped projections.
pub fn build_outputs(cleaned: &HashMap<Dataset, CleanedTable>) -> Result<Vec<(String, DataFrame)>> {
    let mut outputs = Vec::new();
    for dataset in Dataset::ALL {
        let Some(table) = cleaned.get(&dataset) else {
            continue;
        };
        outputs.push((format!("{}_cleaned", dataset), table.frame.clone()));

        match dataset {
            Dataset::Orders => {
                let (orders, items) = split_order_tables(&table.frame)?;
                outputs.push(("orders".to_string(), orders));
                outputs.push(("order_items".to_string(), items));
            }
            Dataset::Products => outputs.push(("suppliers".to_string(), suppliers_table(&table.frame)?)),
            Dataset::Customers => {}
        }
    }
    Ok(outputs)
}

/// Writes tables, then reports and metrics. Returns the number of tables written.
pub fn write_outputs(
    storage: &LocalStorage,
    outputs: &PipelineOutputs,
    write_reports: bool,
) -> Result<usize> {
    info!("Writing run {} to {}", storage.paths().run_id(), storage.paths().root().display());

    for (name, df) in &outputs.tables {
        storage.store_table(name, df)?;
    }

    if write_reports {
        for dataset in Dataset::ALL {
            if let Some(table) = outputs.cleaned.get(&dataset) {
                storage.store_json(&format!("{}_report", dataset), &table.report)?;
            }
        }
    }

    match outputs.metric_inputs() {
        Some(inputs) => {
            let metrics = PipelineMetrics::compute(&inputs)?;
            info!(
                "📊 {} customers, {} orders, revenue {:.2}",
                metrics.business.total_customers, metrics.business.total_orders, metrics.business.total_revenue
            );
            storage.store_json("metrics", &metrics)?;
        }
        None => warn!("⚠️ Metrics need all three datasets; skipping metrics.json"),
    }

    Ok(outputs.tables.len())
}

/// Cleans already-loaded datasets in order and writes only if all of them succeed.
pub fn run(
    raw: Vec<(Dataset, DataFrame)>,
    settings: CleaningSettings,
    storage: &LocalStorage,
    write_reports: bool,
) -> Result<usize> {
    let results = raw
        .into_iter()
        .map(|(dataset, df)| (dataset, clean_dataset(dataset, &df, settings)))
        .collect();
    let outputs = assemble_outputs(results)?;
    write_outputs(storage, &outputs, write_reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SchemaError;
    use crate::models::OutputFormat;
    use crate::processor::frame::frame_from_text_columns;
    use crate::storage::StorageManager;

    fn text(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    fn settings() -> CleaningSettings {
        CleaningSettings {
            reference_year: 2024,
            tracking_seed: Some(5),
        }
    }

    fn raw_orders() -> DataFrame {
        frame_from_text_columns(vec![
            ("order_id", text(&[Some("O1"), Some("O2")])),
            ("customer_id", text(&[Some("10"), Some("11")])),
            ("item_id", text(&[Some("I1"), Some("I1")])),
            ("product_id", text(&[Some("P1"), Some("P2")])),
            ("order_date", text(&[Some("2024-01-31"), Some("2024-02-01")])),
            ("order_datetime", text(&[Some("2024-01-31 09:00:00"), Some("2024-02-01 10:00:00")])),
            ("status", text(&[Some("shipped"), Some("pending")])),
            ("quantity", text(&[Some("2"), Some("1")])),
            ("unit_price", text(&[Some("10"), Some("5")])),
            ("shipping_cost", text(&[Some("1"), Some("0")])),
            ("tax", text(&[Some("1"), Some("0")])),
            ("discount", text(&[Some("0"), Some("0")])),
            ("order_total", text(&[Some("22"), Some("5")])),
            ("payment_method", text(&[Some("card"), Some("paypal")])),
            ("shipping_address", text(&[Some("1 Main"), Some("2 Oak")])),
            ("tracking_number", text(&[None, None])),
        ])
        .unwrap()
    }

    fn scratch_storage() -> LocalStorage {
        let root = std::env::temp_dir().join(format!("shop_etl_pipeline_{}", uuid::Uuid::new_v4()));
        LocalStorage::new(StorageManager::new(root), OutputFormat::Csv)
    }

    #[test]
    fn test_schema_error_in_one_dataset_writes_nothing() {
        let broken_products = frame_from_text_columns(vec![("product_id", text(&[Some("P1")]))]).unwrap();
        let storage = scratch_storage();

        let err = run(
            vec![(Dataset::Orders, raw_orders()), (Dataset::Products, broken_products)],
            settings(),
            &storage,
            true,
        )
        .unwrap_err();

        assert_eq!(
            err.downcast_ref::<SchemaError>(),
            Some(&SchemaError::missing_column("products", "category"))
        );
        assert!(!storage.paths().root().exists());
    }

    #[test]
    fn test_assemble_outputs_rejects_any_failed_dataset() {
        let orders = clean_dataset(Dataset::Orders, &raw_orders(), settings());
        let customers = clean_dataset(Dataset::Customers, &raw_orders(), settings());
        assert!(orders.is_ok());
        assert!(customers.is_err());

        let result = assemble_outputs(vec![(Dataset::Orders, orders), (Dataset::Customers, customers)]);
        let err = result.err().unwrap();
        assert!(err.downcast_ref::<SchemaError>().is_some());
        assert!(err.to_string().contains("customers"));
    }

    #[test]
    fn test_orders_only_run_writes_split_tables_and_report() {
        let storage = scratch_storage();
        let written = run(vec![(Dataset::Orders, raw_orders())], settings(), &storage, true).unwrap();
        assert_eq!(written, 3);

        for table in ["orders_cleaned", "orders", "order_items"] {
            assert!(storage.paths().generate_clean_path(table, OutputFormat::Csv).exists());
        }
        assert!(storage.paths().generate_report_path("orders_report").exists());
        assert!(!storage.paths().generate_report_path("metrics").exists());

        std::fs::remove_dir_all(storage.paths().root()).unwrap();
    }

    #[test]
    fn test_metric_inputs_need_every_dataset() {
        let cleaned = clean_dataset(Dataset::Orders, &raw_orders(), settings()).unwrap();
        let outputs = assemble_outputs(vec![(Dataset::Orders, Ok(cleaned))]).unwrap();
        let names: Vec<&str> = outputs.tables.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["orders_cleaned", "orders", "order_items"]);
        assert!(outputs.metric_inputs().is_none());
    }
}
