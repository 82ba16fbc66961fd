use crate::models::OrderStatus;
use crate::processor::frame::*;
use crate::processor::mergers::{merge_order_status, merge_quantities};
use crate::processor::quality::{CleanedTable, CleaningReport};
use crate::processor::standardizers::*;
use crate::processor::validators::*;
use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use tracing::info;

pub const DATASET: &str = "orders";

pub const REQUIRED_COLUMNS: [&str; 11] = [
    "order_id",
    "customer_id",
    "order_date",
    "order_datetime",
    "status",
    "quantity",
    "unit_price",
    "shipping_cost",
    "tax",
    "discount",
    "order_total",
];

const REDUNDANT_IDS: [(&str, &str); 2] = [("cust_id", "customer_id"), ("ord_id", "order_id")];

/// Columns of the loader's `orders` table, deduplicated by `order_id`.
pub const ORDER_TABLE_COLUMNS: [&str; 12] = [
    "order_id",
    "customer_id",
    "order_date",
    "order_datetime",
    "status",
    "payment_method",
    "shipping_address",
    "tracking_number",
    "shipping_cost",
    "tax",
    "discount",
    "order_total",
];

/// Columns of the loader's `order_items` table, deduplicated by `(order_id, item_id)`.
pub const ORDER_ITEM_COLUMNS: [&str; 6] = [
    "order_id",
    "item_id",
    "product_id",
    "quantity",
    "unit_price",
    "total_amount",
];

const TRACKING_PREFIX: &str = "TRK";
/// Notes are dropped when more than this share is missing and they carry almost no variety.
const NOTES_MISSING_THRESHOLD: f64 = 75.0;
const NOTES_MAX_DISTINCT: usize = 2;

pub struct OrderCleaner {
    tracking_seed: Option<u64>,
}

impl OrderCleaner {
    /// A fixed `tracking_seed` makes synthesized tracking numbers reproducible.
    pub fn new(tracking_seed: Option<u64>) -> Self {
        OrderCleaner { tracking_seed }
    }

    pub fn clean(&self, raw: &DataFrame) -> Result<CleanedTable> {
        let mut rng = match self.tracking_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.clean_with_rng(raw, &mut rng)
    }

    /// Same as [`clean`](Self::clean) with the tracking-number source supplied by the caller.
    pub fn clean_with_rng<R: Rng>(&self, raw: &DataFrame, rng: &mut R) -> Result<CleanedTable> {
        require_columns(raw, DATASET, &REQUIRED_COLUMNS)?;

        let mut df = raw.clone();
        let mut report = CleaningReport::new(DATASET, raw);
        info!("Starting data cleaning process, original shape: {:?}", raw.shape());

        info!("Removing duplicate columns...");
        self.remove_duplicate_columns(&mut df)?;

        info!("Standardizing date formats...");
        self.parse_dates(&mut df, &mut report)?;

        info!("Handling missing values...");
        self.cross_fill_dates(&mut df, &mut report)?;
        self.fill_tracking_numbers(&mut df, &mut report, rng)?;

        info!("Standardizing status columns...");
        self.unify_status(&mut df, &mut report)?;

        info!("Fixing quantity columns...");
        self.unify_quantity(&mut df, &mut report)?;

        info!("Recalculating financial columns...");
        self.recalculate_totals(&mut df, &mut report)?;

        info!("Handling low-value columns...");
        self.handle_notes(&mut df)?;

        info!("Final data validation...");
        self.final_validation(&mut df, &mut report)?;

        report.finish(&df)?;
        report.log_summary();
        info!("✅ Order cleaning completed, shape: {:?}", df.shape());

        Ok(CleanedTable { frame: df, report })
    }

    fn remove_duplicate_columns(&self, df: &mut DataFrame) -> Result<()> {
        for (redundant, canonical) in REDUNDANT_IDS {
            if drop_if_present(df, redundant)? {
                info!("  - Removed '{}' column (duplicate of '{}')", redundant, canonical);
            }
        }
        Ok(())
    }

    fn parse_dates(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let raw_dates = text_values(df, "order_date")?;
        let dates: Vec<Option<String>> = raw_dates
            .iter()
            .map(|v| {
                v.as_deref()
                    .and_then(parse_order_date)
                    .map(|d| d.format(DATE_OUTPUT_FORMAT).to_string())
            })
            .collect();

        let raw_datetimes = text_values(df, "order_datetime")?;
        let datetimes: Vec<Option<String>> = raw_datetimes
            .iter()
            .map(|v| {
                v.as_deref()
                    .and_then(parse_timestamp)
                    .map(|ts| ts.format(DATETIME_OUTPUT_FORMAT).to_string())
            })
            .collect();

        report.record(
            "unparseable_dates_nulled",
            count_lost(&raw_dates, &dates) + count_lost(&raw_datetimes, &datetimes),
        );
        set_text(df, "order_date", dates)?;
        set_text(df, "order_datetime", datetimes)
    }

    /// A missing date takes the datetime's calendar day; a missing datetime
    /// becomes noon on the known date.
    fn cross_fill_dates(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let mut dates: Vec<Option<NaiveDate>> = text_values(df, "order_date")?
            .iter()
            .map(|v| v.as_deref().and_then(parse_calendar_date))
            .collect();
        let mut datetimes: Vec<Option<NaiveDateTime>> = text_values(df, "order_datetime")?
            .iter()
            .map(|v| v.as_deref().and_then(parse_timestamp))
            .collect();

        let (mut dates_filled, mut datetimes_filled) = (0, 0);
        for (date, datetime) in dates.iter_mut().zip(datetimes.iter_mut()) {
            match (*date, *datetime) {
                (None, Some(ts)) => {
                    *date = Some(ts.date());
                    dates_filled += 1;
                }
                (Some(d), None) => {
                    *datetime = d.and_hms_opt(12, 0, 0);
                    datetimes_filled += 1;
                }
                _ => {}
            }
        }
        info!("  - Filled {} missing order_date values from order_datetime", dates_filled);
        info!("  - Filled {} missing order_datetime values", datetimes_filled);
        report.record("order_dates_filled", dates_filled);
        report.record("order_datetimes_filled", datetimes_filled);

        set_text(
            df,
            "order_date",
            dates.iter().map(|d| d.map(|d| d.format(DATE_OUTPUT_FORMAT).to_string())).collect(),
        )?;
        set_text(
            df,
            "order_datetime",
            datetimes
                .iter()
                .map(|ts| ts.map(|ts| ts.format(DATETIME_OUTPUT_FORMAT).to_string()))
                .collect(),
        )
    }

    /// Decided on the more severe of the raw `status` and `order_status`, before the merge.
    fn fill_tracking_numbers<R: Rng>(
        &self,
        df: &mut DataFrame,
        report: &mut CleaningReport,
        rng: &mut R,
    ) -> Result<()> {
        if !has_column(df, "tracking_number") {
            return Ok(());
        }
        let statuses = text_values(df, "status")?;
        let order_statuses = optional_text_values(df, "order_status")?;
        let mut tracking = text_values(df, "tracking_number")?;

        let mut generated = 0;
        let rows = statuses.iter().zip(&order_statuses).zip(tracking.iter_mut());
        for ((status, order_status), number) in rows {
            let parsed = status.as_deref().and_then(OrderStatus::parse);
            let parsed_order = order_status.as_deref().and_then(OrderStatus::parse);
            let effective = match (parsed, parsed_order) {
                (Some(a), Some(b)) => Some(merge_order_status(a, b)),
                (a, b) => a.or(b),
            };
            let needs_tracking = effective.is_some_and(|s| s.requires_tracking());
            let missing = number.as_deref().is_none_or(|n| n.trim().is_empty());
            if needs_tracking && missing {
                *number = Some(format!("{}{}", TRACKING_PREFIX, rng.gen_range(100_000..999_999)));
                generated += 1;
            }
        }
        info!("  - Generated {} tracking numbers for shipped/delivered orders", generated);
        report.record("tracking_numbers_generated", generated);
        set_text(df, "tracking_number", tracking)
    }

    fn unify_status(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let (statuses, defaulted) = standardized_statuses(df, "status")?;
        report.record("status_defaulted_to_pending", defaulted);

        let unified: Vec<OrderStatus> = if has_column(df, "order_status") {
            let (order_statuses, defaulted) = standardized_statuses(df, "order_status")?;
            report.record("order_status_defaulted_to_pending", defaulted);
            statuses
                .into_iter()
                .zip(order_statuses)
                .map(|(a, b)| merge_order_status(a, b))
                .collect()
        } else {
            statuses
        };

        set_text(df, "status", unified.iter().map(|s| Some(s.as_str().to_string())).collect())?;
        if drop_if_present(df, "order_status")? {
            info!("  - Merged 'status' and 'order_status' into unified 'status'");
        }
        Ok(())
    }

    /// The conflict flag is computed before the merge; an existing flag is never cleared.
    fn unify_quantity(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let quantity = number_values(df, "quantity")?;
        let existing = existing_flags(df, "quantity_conflict")?;

        let (merged, conflicts): (Vec<Option<f64>>, Vec<Option<bool>>) = if has_column(df, "qty") {
            let qty = number_values(df, "qty")?;
            quantity
                .iter()
                .zip(&qty)
                .zip(&existing)
                .map(|((q, alt), prev)| {
                    (merge_quantities(*q, *alt), Some(quantity_conflict(*q, *alt) || *prev))
                })
                .unzip()
        } else {
            (quantity, existing.into_iter().map(Some).collect())
        };

        report.record("quantity_conflicts", conflicts.iter().filter(|c| **c == Some(true)).count());
        set_bools(df, "quantity_conflict", conflicts)?;
        set_numbers(df, "quantity", merged)?;
        if drop_if_present(df, "qty")? {
            info!("  - Unified 'quantity' column from 'quantity' and 'qty'");
        }
        Ok(())
    }

    fn recalculate_totals(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let amounts = read_amounts(df)?;
        let stated = number_values(df, "order_total")?;
        let existing = existing_flags(df, "total_mismatch")?;

        let mismatches: Vec<Option<bool>> = amounts
            .iter()
            .zip(&stated)
            .zip(&existing)
            .map(|((a, total), prev)| Some(!totals_close(*total, a.expected_total()) || *prev))
            .collect();
        report.record("totals_mismatched", mismatches.iter().filter(|m| **m == Some(true)).count());

        set_bools(df, "total_mismatch", mismatches)?;
        write_totals(df, &amounts)?;
        drop_if_present(df, "price")?;
        info!("  - Recalculated totals and added 'total_mismatch' flag");
        Ok(())
    }

    fn handle_notes(&self, df: &mut DataFrame) -> Result<()> {
        if !has_column(df, "notes") {
            return Ok(());
        }
        let notes = text_values(df, "notes")?;
        if notes_are_low_value(&notes) {
            df.drop_in_place("notes")?;
            info!("  - Dropped low-value 'notes' column");
        } else {
            set_text(df, "notes", notes.into_iter().map(|n| Some(n.unwrap_or_default())).collect())?;
            info!("  - Filled missing notes");
        }
        Ok(())
    }

    /// Non-negativity and the discount cap; totals are then re-derived so the
    /// order total formula holds for every row of the output.
    fn final_validation(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let mut amounts = read_amounts(df)?;
        let (mut capped, mut flipped) = (0, 0);
        for row in amounts.iter_mut() {
            let (was_capped, signs) = row.enforce_ranges();
            capped += usize::from(was_capped);
            flipped += signs;
        }
        report.record("discounts_capped", capped);
        report.record("negative_values_flipped", flipped);

        set_numbers(df, "unit_price", amounts.iter().map(|a| a.unit_price).collect())?;
        set_numbers(df, "quantity", amounts.iter().map(|a| a.quantity).collect())?;
        set_numbers(df, "shipping_cost", amounts.iter().map(|a| a.shipping_cost).collect())?;
        set_numbers(df, "tax", amounts.iter().map(|a| a.tax).collect())?;
        set_numbers(df, "discount", amounts.iter().map(|a| a.discount).collect())?;
        write_totals(df, &amounts)
    }
}

fn standardized_statuses(df: &DataFrame, name: &str) -> Result<(Vec<OrderStatus>, usize)> {
    let mut defaulted = 0;
    let statuses = text_values(df, name)?
        .iter()
        .map(|raw| {
            let (status, mapped) = standardize_order_status(raw.as_deref());
            defaulted += usize::from(!mapped);
            status
        })
        .collect();
    Ok((statuses, defaulted))
}

fn existing_flags(df: &DataFrame, name: &str) -> Result<Vec<bool>> {
    if !has_column(df, name) {
        return Ok(vec![false; df.height()]);
    }
    Ok(bool_values(df, name)?.into_iter().map(|f| f == Some(true)).collect())
}

fn read_amounts(df: &DataFrame) -> Result<Vec<OrderAmounts>> {
    let unit_price = number_values(df, "unit_price")?;
    let quantity = number_values(df, "quantity")?;
    let shipping_cost = number_values(df, "shipping_cost")?;
    let tax = number_values(df, "tax")?;
    let discount = number_values(df, "discount")?;

    Ok((0..df.height())
        .map(|i| OrderAmounts {
            unit_price: unit_price[i],
            quantity: quantity[i],
            shipping_cost: shipping_cost[i],
            tax: tax[i],
            discount: discount[i],
        })
        .collect())
}

fn write_totals(df: &mut DataFrame, amounts: &[OrderAmounts]) -> Result<()> {
    set_numbers(df, "order_total", amounts.iter().map(|a| a.expected_total()).collect())?;
    set_numbers(df, "total_amount", amounts.iter().map(|a| a.net_amount()).collect())
}

/// Mostly-missing notes with at most two distinct values carry no information.
pub fn notes_are_low_value(notes: &[Option<String>]) -> bool {
    if notes.is_empty() {
        return false;
    }
    let missing = notes.iter().filter(|n| n.is_none()).count();
    let missing_pct = missing as f64 / notes.len() as f64 * 100.0;
    let distinct: HashSet<&str> = notes.iter().flatten().map(String::as_str).collect();
    missing_pct > NOTES_MISSING_THRESHOLD && distinct.len() <= NOTES_MAX_DISTINCT
}

/// Projects a cleaned wide order table into the loader's `orders` and
/// `order_items` tables.
pub fn split_order_tables(cleaned: &DataFrame) -> Result<(DataFrame, DataFrame)> {
    require_columns(cleaned, DATASET, &ORDER_TABLE_COLUMNS)?;
    require_columns(cleaned, DATASET, &ORDER_ITEM_COLUMNS)?;

    let mut orders = cleaned.select(ORDER_TABLE_COLUMNS)?;
    let order_keys: Vec<Option<Option<String>>> =
        text_values(&orders, "order_id")?.into_iter().map(Some).collect();
    let duplicate_orders = dedup_first_by(&mut orders, order_keys, true)?;

    let mut items = cleaned.select(ORDER_ITEM_COLUMNS)?;
    let item_keys: Vec<Option<(Option<String>, Option<String>)>> = text_values(&items, "order_id")?
        .into_iter()
        .zip(text_values(&items, "item_id")?)
        .map(Some)
        .collect();
    let duplicate_items = dedup_first_by(&mut items, item_keys, true)?;

    info!(
        "Split orders into {} orders ({} repeated rows) and {} order items ({} repeated rows)",
        orders.height(),
        duplicate_orders,
        items.height(),
        duplicate_items
    );
    Ok((orders, items))
}
