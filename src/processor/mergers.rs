//! Resolution of redundant column pairs produced by schema drift.
//!
//! Every merger follows the same outer contract: two missing (or blank) inputs
//! give a missing result, a single present input wins outright, and only when
//! both are present does the per-field tie-break apply.

use crate::models::OrderStatus;

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Applies the shared missing/blank contract, deferring to `tie_break` when both are present.
fn merge_with<F>(first: Option<&str>, second: Option<&str>, tie_break: F) -> Option<String>
where
    F: FnOnce(&str, &str) -> String,
{
    match (present(first), present(second)) {
        (None, None) => None,
        (Some(a), None) => Some(a.to_string()),
        (None, Some(b)) => Some(b.to_string()),
        (Some(a), Some(b)) => Some(tie_break(a, b)),
    }
}

/// Prefers the value that looks like a full name (contains a space).
pub fn merge_names(first: Option<&str>, second: Option<&str>) -> Option<String> {
    merge_with(first, second, |a, b| {
        if b.contains(' ') && !a.contains(' ') {
            b.to_string()
        } else {
            a.to_string()
        }
    })
}

pub fn merge_emails(first: Option<&str>, second: Option<&str>) -> Option<String> {
    merge_with(first, second, |a, b| {
        if !a.contains('@') && b.contains('@') {
            b.to_string()
        } else {
            a.to_string()
        }
    })
}

/// Longer phone strings are assumed more complete; ties keep the first.
pub fn merge_phones(first: Option<&str>, second: Option<&str>) -> Option<String> {
    merge_with(first, second, |a, b| {
        if a.chars().count() >= b.chars().count() {
            a.to_string()
        } else {
            b.to_string()
        }
    })
}

/// A lone postal code is truncated to the text before its first `-` (ZIP+4 → ZIP).
pub fn merge_zip_codes(zip: Option<&str>, postal: Option<&str>) -> Option<String> {
    match (present(zip), present(postal)) {
        (None, None) => None,
        (None, Some(postal)) => postal.split('-').next().map(str::to_string),
        (Some(zip), _) => Some(zip.to_string()),
    }
}

/// First non-blank wins. Used for date pairs and customer status pairs.
pub fn merge_first_present(first: Option<&str>, second: Option<&str>) -> Option<String> {
    merge_with(first, second, |a, _| a.to_string())
}

/// The more advanced lifecycle state wins; ties keep the first.
pub fn merge_order_status(first: OrderStatus, second: OrderStatus) -> OrderStatus {
    if first.severity() >= second.severity() {
        first
    } else {
        second
    }
}

/// The larger count is taken as the corrected recount.
pub fn merge_quantities(quantity: Option<f64>, qty: Option<f64>) -> Option<f64> {
    match (quantity, qty) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
