use crate::processor::frame::*;
use crate::processor::quality::{CleanedTable, CleaningReport};
use crate::processor::standardizers::*;
use crate::processor::validators::*;
use anyhow::Result;
use polars::prelude::*;
use tracing::info;

pub const DATASET: &str = "products";

pub const REQUIRED_COLUMNS: [&str; 17] = [
    "product_id",
    "category",
    "product_category",
    "brand",
    "manufacturer",
    "is_active",
    "price",
    "list_price",
    "cost",
    "stock_quantity",
    "stock_level",
    "reorder_level",
    "color",
    "size",
    "created_date",
    "last_updated",
    "dimensions",
];

/// Free-text columns where an empty string means "not provided".
const BLANKABLE_COLUMNS: [&str; 9] = [
    "description",
    "brand",
    "manufacturer",
    "color",
    "size",
    "supplier_id",
    "created_date",
    "last_updated",
    "dimensions",
];
const PRICE_COLUMNS: [&str; 3] = ["price", "list_price", "cost"];
const STOCK_COLUMNS: [&str; 3] = ["stock_quantity", "stock_level", "reorder_level"];
const TIMESTAMP_COLUMNS: [&str; 2] = ["created_date", "last_updated"];

pub struct ProductCleaner {
    rules: PatternRules,
}

impl ProductCleaner {
    pub fn new() -> Result<Self> {
        Ok(ProductCleaner {
            rules: PatternRules::new()?,
        })
    }

    pub fn clean(&self, raw: &DataFrame) -> Result<CleanedTable> {
        require_columns(raw, DATASET, &REQUIRED_COLUMNS)?;

        let mut df = raw.clone();
        let mut report = CleaningReport::new(DATASET, raw);
        info!("Starting product cleaning, initial shape: {:?}", raw.shape());

        info!("1. Converting empty strings to missing...");
        self.blanks_to_missing(&mut df)?;

        info!("2. Converting price columns to numeric types...");
        self.coerce_prices(&mut df, &mut report)?;

        info!("3. Standardizing category and product_category...");
        self.unify_categories(&mut df)?;

        info!("4. Standardizing brand and manufacturer names...");
        map_text(&mut df, "brand", standardize_brand)?;
        map_text(&mut df, "manufacturer", standardize_brand)?;

        info!("5. Standardizing is_active...");
        self.standardize_active_flag(&mut df, &mut report)?;

        info!("6. Standardizing color and size...");
        map_text(&mut df, "color", |v| Some(standardize_color(v)))?;
        map_text(&mut df, "size", |v| Some(standardize_size(v)))?;

        info!("7. Parsing date columns...");
        self.parse_timestamps(&mut df, &mut report)?;

        info!("8. Validating dimensions format...");
        self.validate_dimensions(&mut df, &mut report)?;

        info!("9. Checking category consistency...");
        self.flag_category_mismatch(&mut df, &mut report)?;

        info!("10. Validating numeric ranges...");
        self.validate_numeric_ranges(&mut df, &mut report)?;

        report.finish(&df)?;
        report.log_summary();

        Ok(CleanedTable { frame: df, report })
    }

    fn blanks_to_missing(&self, df: &mut DataFrame) -> Result<()> {
        for name in BLANKABLE_COLUMNS {
            if has_column(df, name) {
                map_text(df, name, |v| {
                    if v.trim().is_empty() { None } else { Some(v.to_string()) }
                })?;
            }
        }
        Ok(())
    }

    fn coerce_prices(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let mut unparseable = 0;
        for name in PRICE_COLUMNS.iter().copied().chain(["weight"]) {
            if !has_column(df, name) {
                continue;
            }
            let raw = text_values(df, name)?;
            let parsed: Vec<Option<f64>> = raw.iter().map(|v| v.as_deref().and_then(parse_number)).collect();
            unparseable += count_lost(&raw, &parsed);
            set_numbers(df, name, parsed)?;
        }
        report.record("unparseable_numbers_nulled", unparseable);
        Ok(())
    }

    /// Both taxonomies are standardized first so casing never produces a false mismatch.
    fn unify_categories(&self, df: &mut DataFrame) -> Result<()> {
        map_text(df, "category", |v| Some(standardize_category(v)))?;
        map_text(df, "product_category", |v| Some(standardize_category(v)))?;

        let category = text_values(df, "category")?;
        let product_category = text_values(df, "product_category")?;
        let unified: Vec<Option<String>> = category
            .iter()
            .zip(&product_category)
            .map(|(c, p)| final_category(c.as_deref(), p.as_deref()))
            .collect();
        set_text(df, "final_category", unified)
    }

    fn standardize_active_flag(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let raw = text_values(df, "is_active")?;
        let flags: Vec<Option<bool>> = raw.iter().map(|v| v.as_deref().and_then(standardize_bool)).collect();
        report.record("unrecognized_active_flags", count_lost(&raw, &flags));

        let prices = number_values(df, "price")?;
        let stock = number_values(df, "stock_quantity")?;
        let issues: Vec<Option<bool>> = flags
            .iter()
            .zip(prices.iter().zip(&stock))
            .map(|(active, (price, stock))| Some(active_flag_issue(*active, *price, *stock)))
            .collect();
        report.record("active_flag_issues", issues.iter().filter(|i| **i == Some(true)).count());

        set_bools(df, "is_active", flags)?;
        set_bools(df, "is_active_flag_issue", issues)
    }

    fn parse_timestamps(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let mut unparseable = 0;
        for name in TIMESTAMP_COLUMNS {
            let raw = text_values(df, name)?;
            let parsed: Vec<Option<String>> = raw
                .iter()
                .map(|v| {
                    v.as_deref()
                        .and_then(parse_product_timestamp)
                        .map(|ts| ts.format(PRODUCT_TIMESTAMP_FORMAT).to_string())
                })
                .collect();
            unparseable += count_lost(&raw, &parsed);
            set_text(df, name, parsed)?;
        }
        report.record("unparseable_dates_nulled", unparseable);
        Ok(())
    }

    fn validate_dimensions(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let raw = text_values(df, "dimensions")?;
        let validated: Vec<Option<String>> = raw
            .iter()
            .map(|d| self.rules.validate_dimensions(d.as_deref()))
            .collect();
        report.record("invalid_dimensions_nulled", count_lost(&raw, &validated));
        set_text(df, "dimensions", validated)
    }

    fn flag_category_mismatch(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let category = text_values(df, "category")?;
        let product_category = text_values(df, "product_category")?;
        let mismatches: Vec<Option<bool>> = category
            .iter()
            .zip(&product_category)
            .map(|(c, p)| Some(category_mismatch(c.as_deref(), p.as_deref())))
            .collect();
        report.record("category_mismatches", mismatches.iter().filter(|m| **m == Some(true)).count());
        set_bools(df, "category_mismatch", mismatches)
    }

    fn validate_numeric_ranges(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let mut negative_prices = 0;
        for name in PRICE_COLUMNS {
            let values = number_values(df, name)?;
            let checked: Vec<Option<f64>> = values.iter().map(|v| price_in_range(*v)).collect();
            negative_prices += count_lost(&values, &checked);
            set_numbers(df, name, checked)?;
        }
        report.record("negative_prices_nulled", negative_prices);
        self.reflag_active_after_ranges(df, report)?;

        let mut zeroed = 0;
        for name in STOCK_COLUMNS {
            let values = number_values(df, name)?;
            zeroed += values.iter().filter(|v| v.is_some_and(|s| s < 0.0)).count();
            set_numbers(df, name, values.into_iter().map(stock_in_range).collect())?;
        }
        report.record("negative_stock_zeroed", zeroed);

        if has_column(df, "rating") {
            let values = number_values(df, "rating")?;
            let checked: Vec<Option<f64>> = values.iter().map(|r| rating_in_range(*r)).collect();
            report.record("ratings_out_of_range_nulled", count_lost(&values, &checked));
            set_numbers(df, "rating", checked)?;
        }
        Ok(())
    }

    /// A price nulled by the range check leaves an active product without a price.
    /// Flags are only raised here, never cleared.
    fn reflag_active_after_ranges(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let active = bool_values(df, "is_active")?;
        let prices = number_values(df, "price")?;
        let stock = number_values(df, "stock_quantity")?;
        let existing = bool_values(df, "is_active_flag_issue")?;

        let mut raised = 0;
        let issues: Vec<Option<bool>> = existing
            .iter()
            .zip(active.iter().zip(prices.iter().zip(&stock)))
            .map(|(flagged, (active, (price, stock)))| {
                let issue = active_flag_issue(*active, *price, *stock);
                if issue && *flagged != Some(true) {
                    raised += 1;
                }
                Some(issue || *flagged == Some(true))
            })
            .collect();
        report.record("active_flag_issues_after_ranges", raised);
        set_bools(df, "is_active_flag_issue", issues)
    }
}

/// Distinct, non-missing supplier ids in first-seen order, for the suppliers table.
pub fn suppliers_table(products: &DataFrame) -> Result<DataFrame> {
    let ids = optional_text_values(products, "supplier_id")?;
    let mut seen = std::collections::HashSet::new();
    let distinct: Vec<Option<String>> = ids
        .into_iter()
        .flatten()
        .filter(|id| seen.insert(id.clone()))
        .map(Some)
        .collect();
    frame_from_text_columns(vec![("supplier_id", distinct)])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    fn raw_products() -> DataFrame {
        frame_from_text_columns(vec![
            ("product_id", text(&[Some("P1"), Some("P2"), Some("P3")])),
            ("description", text(&[Some(""), Some("Lamp"), Some("Ball")])),
            ("category", text(&[Some("ELECTRONICS"), None, Some("sports")])),
            ("product_category", text(&[Some("electronics"), Some("toys"), Some("Outdoor")])),
            ("brand", text(&[Some("acme_corp"), Some(""), Some("GLOBEX-inc")])),
            ("manufacturer", text(&[Some("initech"), None, Some("umbrella_co")])),
            ("is_active", text(&[Some("YES"), Some("0"), Some("maybe")])),
            ("price", text(&[None, Some("19.99"), Some("-5")])),
            ("list_price", text(&[Some("25"), Some("abc"), Some("12")])),
            ("cost", text(&[Some("10"), Some("-1"), Some("4")])),
            ("weight", text(&[Some("1.5"), None, Some("0.3")])),
            ("stock_quantity", text(&[Some("10"), Some("-3"), None])),
            ("stock_level", text(&[Some("5"), Some("2"), Some("-1")])),
            ("reorder_level", text(&[Some("1"), Some("1"), Some("1")])),
            ("color", text(&[Some("grey"), Some("NAVY blue"), Some("")])),
            ("size", text(&[Some("onesize"), Some(" m "), Some("42w")])),
            ("supplier_id", text(&[Some("S1"), Some(""), Some("S1")])),
            ("created_date", text(&[Some("2023-01-05T10:15:30.000Z"), Some("2023-02-01"), Some("02/01/2023")])),
            ("last_updated", text(&[Some(""), Some("2023-03-01"), None])),
            ("dimensions", text(&[Some("10x20x30"), Some("10 x 20"), None])),
            ("rating", text(&[Some("4.5"), Some("7"), Some("-1")])),
        ])
        .unwrap()
    }

    fn cleaned() -> CleanedTable {
        ProductCleaner::new().unwrap().clean(&raw_products()).unwrap()
    }

    #[test]
    fn test_categories_unified_and_compared_after_standardizing() {
        let table = cleaned();
        let df = &table.frame;
        assert_eq!(
            text_values(df, "final_category").unwrap(),
            text(&[Some("Electronics"), Some("Toys"), Some("Sports")])
        );
        assert_eq!(
            bool_values(df, "category_mismatch").unwrap(),
            vec![Some(false), Some(false), Some(true)]
        );
        assert_eq!(table.report.anomaly("category_mismatches"), 1);
    }

    #[test]
    fn test_active_flag_issue_for_missing_price() {
        let table = cleaned();
        let df = &table.frame;
        assert_eq!(
            bool_values(df, "is_active").unwrap(),
            vec![Some(true), Some(false), None]
        );
        assert_eq!(
            bool_values(df, "is_active_flag_issue").unwrap(),
            vec![Some(true), Some(false), Some(false)]
        );
    }

    #[test]
    fn test_names_colors_and_sizes() {
        let df = cleaned().frame;
        assert_eq!(
            text_values(&df, "brand").unwrap(),
            text(&[Some("Acme Corp"), None, Some("Globex Inc")])
        );
        assert_eq!(
            text_values(&df, "manufacturer").unwrap(),
            text(&[Some("Initech"), None, Some("Umbrella Co")])
        );
        assert_eq!(
            text_values(&df, "color").unwrap(),
            text(&[Some("Gray"), Some("Navy Blue"), None])
        );
        assert_eq!(
            text_values(&df, "size").unwrap(),
            text(&[Some("One Size"), Some("M"), Some("42W")])
        );
        assert_eq!(text_values(&df, "description").unwrap(), text(&[None, Some("Lamp"), Some("Ball")]));
    }

    #[test]
    fn test_timestamps_and_dimensions() {
        let table = cleaned();
        let df = &table.frame;
        assert_eq!(
            text_values(df, "created_date").unwrap(),
            text(&[Some("2023-01-05T10:15:30.000Z"), Some("2023-02-01T00:00:00.000Z"), None])
        );
        assert_eq!(
            text_values(df, "dimensions").unwrap(),
            text(&[Some("10x20x30"), None, None])
        );
        assert_eq!(table.report.anomaly("invalid_dimensions_nulled"), 1);
        assert_eq!(table.report.anomaly("unparseable_dates_nulled"), 1);
    }

    #[test]
    fn test_numeric_ranges() {
        let table = cleaned();
        let df = &table.frame;
        assert_eq!(number_values(df, "price").unwrap(), vec![None, Some(19.99), None]);
        assert_eq!(number_values(df, "list_price").unwrap(), vec![Some(25.0), None, Some(12.0)]);
        assert_eq!(number_values(df, "cost").unwrap(), vec![Some(10.0), None, Some(4.0)]);
        assert_eq!(number_values(df, "stock_quantity").unwrap(), vec![Some(10.0), Some(0.0), None]);
        assert_eq!(number_values(df, "stock_level").unwrap(), vec![Some(5.0), Some(2.0), Some(0.0)]);
        assert_eq!(number_values(df, "rating").unwrap(), vec![Some(4.5), None, None]);
        assert_eq!(table.report.anomaly("negative_prices_nulled"), 2);
        assert_eq!(table.report.anomaly("negative_stock_zeroed"), 2);
    }

    #[test]
    fn test_active_product_with_negative_price_is_flagged() {
        let mut columns: Vec<(&str, Vec<Option<String>>)> = REQUIRED_COLUMNS
            .iter()
            .map(|name| (*name, text(&[Some("1")])))
            .collect();
        for (name, values) in columns.iter_mut() {
            match *name {
                "is_active" => *values = text(&[Some("yes")]),
                "price" => *values = text(&[Some("-5")]),
                _ => {}
            }
        }
        let raw = frame_from_text_columns(columns).unwrap();

        let cleaner = ProductCleaner::new().unwrap();
        let table = cleaner.clean(&raw).unwrap();
        let once = table.frame;
        assert_eq!(bool_values(&once, "is_active").unwrap(), vec![Some(true)]);
        assert_eq!(number_values(&once, "price").unwrap(), vec![None]);
        assert_eq!(bool_values(&once, "is_active_flag_issue").unwrap(), vec![Some(true)]);
        assert_eq!(table.report.anomaly("active_flag_issues"), 0);
        assert_eq!(table.report.anomaly("active_flag_issues_after_ranges"), 1);

        let twice = cleaner.clean(&once).unwrap().frame;
        assert!(once.equals_missing(&twice));
    }

    #[test]
    fn test_missing_category_column_is_fatal() {
        let raw = raw_products().drop("product_category").unwrap();
        let err = ProductCleaner::new().unwrap().clean(&raw).unwrap_err();
        assert!(err.to_string().contains("product_category"));
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let cleaner = ProductCleaner::new().unwrap();
        let once = cleaner.clean(&raw_products()).unwrap().frame;
        let twice = cleaner.clean(&once).unwrap().frame;
        assert!(once.equals_missing(&twice));
    }

    #[test]
    fn test_suppliers_are_distinct() {
        let table = cleaned();
        let suppliers = suppliers_table(&table.frame).unwrap();
        assert_eq!(text_values(&suppliers, "supplier_id").unwrap(), text(&[Some("S1")]));
    }
}
