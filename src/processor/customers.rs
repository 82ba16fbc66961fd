use crate::processor::frame::*;
use crate::processor::mergers::*;
use crate::processor::quality::{CleanedTable, CleaningReport};
use crate::processor::standardizers::*;
use crate::processor::validators::{AgeCheck, PatternRules, reconcile_age};
use anyhow::Result;
use chrono::Datelike;
use polars::prelude::*;
use tracing::info;

pub const DATASET: &str = "customers";

/// Canonical columns a raw customer export must carry.
pub const REQUIRED_COLUMNS: [&str; 17] = [
    "customer_id",
    "customer_name",
    "email",
    "phone",
    "address",
    "city",
    "state",
    "zip_code",
    "registration_date",
    "status",
    "total_orders",
    "total_spent",
    "loyalty_points",
    "age",
    "birth_date",
    "gender",
    "segment",
];

/// Redundant id column left over from an older export.
const REDUNDANT_ID: &str = "cust_id";

type Merger = fn(Option<&str>, Option<&str>) -> Option<String>;

/// Canonical column, drifted duplicate, and the rule that reconciles them.
const MERGE_PAIRS: [(&str, &str, Merger); 6] = [
    ("customer_name", "full_name", merge_names),
    ("email", "email_address", merge_emails),
    ("phone", "phone_number", merge_phones),
    ("zip_code", "postal_code", merge_zip_codes),
    ("registration_date", "reg_date", merge_first_present),
    ("status", "customer_status", merge_first_present),
];

const NUMERIC_COLUMNS: [&str; 4] = ["total_orders", "total_spent", "loyalty_points", "age"];
const DATE_COLUMNS: [&str; 2] = ["registration_date", "birth_date"];

pub struct CustomerCleaner {
    rules: PatternRules,
    reference_year: i32,
}

impl CustomerCleaner {
    /// `reference_year` is the "current" year used to derive ages from birth dates.
    pub fn new(reference_year: i32) -> Result<Self> {
        Ok(CustomerCleaner {
            rules: PatternRules::new()?,
            reference_year,
        })
    }

    /// Runs the full customer pipeline over a copy of `raw`.
    ///
    /// Fails before doing any work if a canonical column is missing.
    pub fn clean(&self, raw: &DataFrame) -> Result<CleanedTable> {
        require_columns(raw, DATASET, &REQUIRED_COLUMNS)?;

        let mut df = raw.clone();
        let mut report = CleaningReport::new(DATASET, raw);

        info!("Step 1: Resolving duplicate columns...");
        self.resolve_duplicate_columns(&mut df)?;

        info!("Step 2: Standardizing data formats...");
        self.standardize_formats(&mut df)?;

        info!("Step 3: Handling missing values...");
        self.normalize_missing_values(&mut df, &mut report)?;

        info!("Step 4: Correcting data types...");
        self.coerce_types(&mut df, &mut report)?;
        self.strip_zip_artifacts(&mut df)?;
        self.parse_dates(&mut df, &mut report)?;

        info!("Step 5: Performing data validation...");
        self.validate_emails(&mut df, &mut report)?;
        self.validate_age_consistency(&mut df, &mut report)?;
        self.deduplicate(&mut df, &mut report)?;

        info!("Step 6: Generating cleaning summary...");
        report.finish(&df)?;
        report.log_summary();

        Ok(CleanedTable { frame: df, report })
    }

    fn resolve_duplicate_columns(&self, df: &mut DataFrame) -> Result<()> {
        if drop_if_present(df, REDUNDANT_ID)? {
            info!("  - Removed '{}' column (duplicate of 'customer_id')", REDUNDANT_ID);
        }

        for (canonical, redundant, merge) in MERGE_PAIRS {
            let first = text_values(df, canonical)?;
            let second = optional_text_values(df, redundant)?;
            let merged: Vec<Option<String>> = first
                .iter()
                .zip(&second)
                .map(|(a, b)| merge(a.as_deref(), b.as_deref()))
                .collect();
            set_text(df, canonical, merged)?;

            if drop_if_present(df, redundant)? {
                info!("  - Merged '{}' into '{}'", redundant, canonical);
            }
        }

        Ok(())
    }

    fn standardize_formats(&self, df: &mut DataFrame) -> Result<()> {
        map_text(df, "phone", |v| Some(standardize_phone(v)))?;
        map_text(df, "registration_date", standardize_date)?;
        map_text(df, "birth_date", standardize_date)?;
        map_text(df, "city", |v| Some(standardize_city(v)))?;
        map_text(df, "state", |v| Some(standardize_state(v)))?;
        map_text(df, "status", |v| Some(standardize_customer_status(v)))?;
        map_text(df, "gender", |v| Some(standardize_gender(v)))?;
        Ok(())
    }

    /// Null tokens become missing across every text column, standardized ones included.
    fn normalize_missing_values(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let mut nulled = 0;
        for name in column_names(df) {
            if df.column(&name)?.dtype() != &DataType::String {
                continue;
            }
            let values = text_values(df, &name)?;
            let before = values.iter().filter(|v| v.is_some()).count();
            let normalized: Vec<Option<String>> = values.into_iter().map(blank_to_missing).collect();
            nulled += before - normalized.iter().filter(|v| v.is_some()).count();
            set_text(df, &name, normalized)?;
        }
        report.record("blank_values_nulled", nulled);
        Ok(())
    }

    fn coerce_types(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let mut unparseable = 0;
        for name in NUMERIC_COLUMNS {
            let raw = text_values(df, name)?;
            let parsed: Vec<Option<f64>> = raw.iter().map(|v| v.as_deref().and_then(parse_number)).collect();
            unparseable += count_lost(&raw, &parsed);
            set_numbers(df, name, parsed)?;
        }
        report.record("unparseable_numbers_nulled", unparseable);

        let ids: Vec<Option<i64>> = number_values(df, "customer_id")?
            .into_iter()
            .map(|id| id.filter(|v| v.fract() == 0.0).map(|v| v as i64))
            .collect();
        set_integers(df, "customer_id", ids)?;
        Ok(())
    }

    /// Zip codes stay text; a `.0` suffix from float parsing is removed.
    fn strip_zip_artifacts(&self, df: &mut DataFrame) -> Result<()> {
        map_text(df, "zip_code", strip_float_artifact)
    }

    /// Anything that survived standardization without becoming a date is nulled here.
    fn parse_dates(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let mut unparseable = 0;
        for name in DATE_COLUMNS {
            let raw = text_values(df, name)?;
            let parsed: Vec<Option<String>> = raw
                .iter()
                .map(|v| {
                    v.as_deref()
                        .and_then(parse_calendar_date)
                        .map(|d| d.format(DATE_OUTPUT_FORMAT).to_string())
                })
                .collect();
            unparseable += count_lost(&raw, &parsed);
            set_text(df, name, parsed)?;
        }
        report.record("unparseable_dates_nulled", unparseable);
        Ok(())
    }

    fn validate_emails(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let raw = text_values(df, "email")?;
        let validated: Vec<Option<String>> = raw
            .iter()
            .map(|e| self.rules.validate_email(e.as_deref()))
            .collect();
        report.record("invalid_emails_nulled", count_lost(&raw, &validated));
        set_text(df, "email", validated)
    }

    fn validate_age_consistency(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let ages = number_values(df, "age")?;
        let birth_years: Vec<Option<i32>> = text_values(df, "birth_date")?
            .iter()
            .map(|v| v.as_deref().and_then(parse_calendar_date).map(|d| d.year()))
            .collect();

        let (mut corrected, mut derived) = (0, 0);
        let reconciled: Vec<Option<f64>> = ages
            .into_iter()
            .zip(birth_years)
            .map(|(age, birth_year)| {
                let check = reconcile_age(age, birth_year, self.reference_year);
                match check {
                    AgeCheck::Corrected(_) => corrected += 1,
                    AgeCheck::Derived(_) => derived += 1,
                    AgeCheck::Unchanged(_) => {}
                }
                check.value()
            })
            .collect();

        report.record("ages_corrected", corrected);
        report.record("ages_derived", derived);
        set_numbers(df, "age", reconciled)
    }

    /// First occurrence of each `customer_id` wins; rows without an id cannot be loaded
    /// and are dropped.
    fn deduplicate(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let ids: Vec<Option<i64>> = number_values(df, "customer_id")?
            .into_iter()
            .map(|id| id.map(|v| v as i64))
            .collect();
        let missing = ids.iter().filter(|id| id.is_none()).count();
        let removed = dedup_first_by(df, ids, false)?;

        report.record("missing_ids_dropped", missing);
        report.record("duplicates_removed", removed - missing);
        Ok(())
    }
}
