//! Per-value normalization rules.
//!
//! All functions here are total: they never fail, and canonical outputs are
//! fixed points (standardizing an already-standardized value changes nothing).

use crate::models::OrderStatus;
use chrono::{NaiveDate, NaiveDateTime};

/// Date layouts tried, in order, for customer dates.
pub const CUSTOMER_DATE_FORMATS: [&str; 4] = ["%m/%d/%Y", "%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
/// Date layouts tried, in order, for order dates before the generic fallback.
pub const ORDER_DATE_FORMATS: [&str; 3] = ["%m/%d/%Y", "%Y-%m-%d", "%d/%m/%Y"];

const DATETIME_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];
const FALLBACK_DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

pub const DATE_OUTPUT_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const PRODUCT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Python-style title case: a letter is upper-cased when it follows a non-letter.
pub fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_cased = false;
    for ch in raw.trim().chars() {
        if ch.is_alphabetic() {
            if prev_cased {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_cased = true;
        } else {
            out.push(ch);
            prev_cased = false;
        }
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn lookup_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Missing-value tokens found in raw exports.
pub fn is_null_token(raw: &str) -> bool {
    matches!(raw.trim(), "" | "null" | "NULL" | "None" | "nan" | "NaN")
}

pub fn blank_to_missing(value: Option<String>) -> Option<String> {
    value.filter(|v| !is_null_token(v))
}

/// `(XXX) XXX-XXXX` for 10-digit numbers and 11-digit numbers with a leading 1.
/// Anything else is returned unchanged.
pub fn standardize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let national = match digits.len() {
        10 => &digits[..],
        11 if digits.starts_with('1') => &digits[1..],
        _ => return raw.to_string(),
    };
    format!("({}) {}-{}", &national[..3], &national[3..6], &national[6..])
}

/// Rewrites a customer date as `YYYY-MM-DD`. Unrecognized text is passed
/// through untouched; the customer cleaner's date-parsing step nulls it later.
pub fn standardize_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for fmt in CUSTOMER_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date.format(DATE_OUTPUT_FORMAT).to_string());
        }
    }
    Some(raw.to_string())
}

/// Generic timestamp parse: full datetime layouts first, then bare dates at midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(ts);
        }
    }
    FALLBACK_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Calendar date from a canonical `YYYY-MM-DD` value or anything [`parse_timestamp`] accepts.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, DATE_OUTPUT_FORMAT)
        .ok()
        .or_else(|| parse_timestamp(trimmed).map(|ts| ts.date()))
}

pub fn parse_order_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    ORDER_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| parse_timestamp(trimmed).map(|ts| ts.date()))
}

/// ISO timestamps (`...T...Z`) or bare `YYYY-MM-DD` dates; nothing else.
pub fn parse_product_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains('T') {
        NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.fZ").ok()
    } else {
        NaiveDate::parse_from_str(trimmed, DATE_OUTPUT_FORMAT)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    }
}

pub fn standardize_city(raw: &str) -> String {
    match lookup_key(raw).as_str() {
        "nyc" => "New York".to_string(),
        "la" => "Los Angeles".to_string(),
        "chi" => "Chicago".to_string(),
        "houston" => "Houston".to_string(),
        "phoenix" => "Phoenix".to_string(),
        _ => title_case(raw),
    }
}

/// Full state names to postal abbreviations; anything else is assumed to be one already.
pub fn standardize_state(raw: &str) -> String {
    match lookup_key(raw).as_str() {
        "california" => "CA".to_string(),
        "new york" => "NY".to_string(),
        "texas" => "TX".to_string(),
        "illinois" => "IL".to_string(),
        "arizona" => "AZ".to_string(),
        "pennsylvania" => "PA".to_string(),
        "florida" => "FL".to_string(),
        _ => raw.trim().to_uppercase(),
    }
}

pub fn standardize_customer_status(raw: &str) -> String {
    match lookup_key(raw).as_str() {
        "active" => "Active".to_string(),
        "inactive" => "Inactive".to_string(),
        "suspended" => "Suspended".to_string(),
        "pending" => "Pending".to_string(),
        _ => title_case(raw),
    }
}

/// Maps a raw order status; unknown or missing values fall back to `PENDING`.
///
/// The second element is `false` when the fallback was used so the cleaner can
/// count silently absorbed values.
pub fn standardize_order_status(raw: Option<&str>) -> (OrderStatus, bool) {
    match raw.and_then(OrderStatus::parse) {
        Some(status) => (status, true),
        None => (OrderStatus::Pending, false),
    }
}

pub fn standardize_gender(raw: &str) -> String {
    match lookup_key(raw).as_str() {
        "f" | "female" => "Female".to_string(),
        "m" | "male" => "Male".to_string(),
        "other" => "Other".to_string(),
        _ => title_case(raw),
    }
}

pub fn standardize_category(raw: &str) -> String {
    match lookup_key(raw).as_str() {
        "clothing" => "Clothing".to_string(),
        "electronics" => "Electronics".to_string(),
        "sports" => "Sports".to_string(),
        "toys" => "Toys".to_string(),
        "books" => "Books".to_string(),
        "home & garden" => "Home & Garden".to_string(),
        _ => title_case(raw),
    }
}

/// Brand and manufacturer names: `_`/`-` become spaces, each word capitalized.
pub fn standardize_brand(raw: &str) -> Option<String> {
    let spaced = raw.trim().replace(['_', '-'], " ");
    let words: Vec<String> = spaced.split_whitespace().map(capitalize).collect();
    if words.is_empty() { None } else { Some(words.join(" ")) }
}

pub fn standardize_color(raw: &str) -> String {
    match lookup_key(raw).as_str() {
        "black" => "Black".to_string(),
        "white" => "White".to_string(),
        "red" => "Red".to_string(),
        "blue" => "Blue".to_string(),
        "green" => "Green".to_string(),
        "yellow" => "Yellow".to_string(),
        "purple" => "Purple".to_string(),
        "orange" => "Orange".to_string(),
        "pink" => "Pink".to_string(),
        "brown" => "Brown".to_string(),
        "gray" | "grey" => "Gray".to_string(),
        _ => title_case(raw),
    }
}

pub fn standardize_size(raw: &str) -> String {
    let key = lookup_key(raw);
    match key.as_str() {
        "xs" | "s" | "m" | "l" | "xl" | "xxl" => key.to_uppercase(),
        "one size" | "onesize" => "One Size".to_string(),
        _ => key.to_uppercase(),
    }
}

/// Tri-state boolean: unrecognized text is unknown, not false.
pub fn standardize_bool(raw: &str) -> Option<bool> {
    match lookup_key(raw).as_str() {
        "true" | "yes" | "1" | "active" => Some(true),
        "false" | "no" | "0" | "inactive" => Some(false),
        _ => None,
    }
}

/// Strips the `.0` left behind when a zip code was read as a float.
pub fn strip_float_artifact(raw: &str) -> Option<String> {
    let stripped = raw.strip_suffix(".0").unwrap_or(raw);
    if stripped == "nan" { None } else { Some(stripped.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_formats() {
        assert_eq!(standardize_phone("1-555-123-4567"), "(555) 123-4567");
        assert_eq!(standardize_phone("555.123.4567"), "(555) 123-4567");
        assert_eq!(standardize_phone("(555) 123-4567"), "(555) 123-4567");
        assert_eq!(standardize_phone("123-45"), "123-45");
        assert_eq!(standardize_phone("25551234567"), "25551234567");
    }

    #[test]
    fn test_customer_dates() {
        assert_eq!(standardize_date("03/15/2021"), Some("2021-03-15".to_string()));
        assert_eq!(standardize_date("2021-03-15"), Some("2021-03-15".to_string()));
        assert_eq!(standardize_date("25/12/2020"), Some("2020-12-25".to_string()));
        assert_eq!(standardize_date("2020/12/25"), Some("2020-12-25".to_string()));
        assert_eq!(standardize_date("someday"), Some("someday".to_string()));
        assert_eq!(standardize_date("   "), None);
    }

    #[test]
    fn test_timestamp_parsing() {
        let ts = parse_timestamp("2024-02-01 08:30:00").unwrap();
        assert_eq!(ts.format(DATETIME_OUTPUT_FORMAT).to_string(), "2024-02-01 08:30:00");
        let midnight = parse_timestamp("2024-02-01").unwrap();
        assert_eq!(midnight.format(DATETIME_OUTPUT_FORMAT).to_string(), "2024-02-01 00:00:00");
        assert!(parse_timestamp("not a time").is_none());
    }

    #[test]
    fn test_order_date_falls_back_to_timestamp() {
        assert_eq!(parse_order_date("01/31/2024"), NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(parse_order_date("31/01/2024"), NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(parse_order_date("2024-01-31 10:00:00"), NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(parse_order_date("garbage"), None);
    }

    #[test]
    fn test_product_timestamps() {
        let iso = parse_product_timestamp("2023-06-01T12:30:00.250Z").unwrap();
        assert_eq!(
            iso.format(PRODUCT_TIMESTAMP_FORMAT).to_string(),
            "2023-06-01T12:30:00.250Z"
        );
        assert!(parse_product_timestamp("2023-06-01").is_some());
        assert!(parse_product_timestamp("06/01/2023").is_none());
    }

    #[test]
    fn test_lookup_tables() {
        assert_eq!(standardize_city("NYC"), "New York");
        assert_eq!(standardize_city("san diego"), "San Diego");
        assert_eq!(standardize_state("Texas"), "TX");
        assert_eq!(standardize_state("ny"), "NY");
        assert_eq!(standardize_customer_status("ACTIVE"), "Active");
        assert_eq!(standardize_customer_status("on hold"), "On Hold");
        assert_eq!(standardize_gender("f"), "Female");
        assert_eq!(standardize_gender("non-binary"), "Non-Binary");
        assert_eq!(standardize_category("HOME & GARDEN"), "Home & Garden");
        assert_eq!(standardize_category("kitchen ware"), "Kitchen Ware");
        assert_eq!(standardize_color("grey"), "Gray");
        assert_eq!(standardize_size("onesize"), "One Size");
        assert_eq!(standardize_size(" xl "), "XL");
        assert_eq!(standardize_size("42w"), "42W");
    }

    #[test]
    fn test_order_status_default_is_reported() {
        assert_eq!(standardize_order_status(Some("Shipped")), (OrderStatus::Shipped, true));
        assert_eq!(standardize_order_status(Some("returned")), (OrderStatus::Pending, false));
        assert_eq!(standardize_order_status(None), (OrderStatus::Pending, false));
    }

    #[test]
    fn test_brand_names() {
        assert_eq!(standardize_brand("acme_corp"), Some("Acme Corp".to_string()));
        assert_eq!(standardize_brand("  GLOBEX-industries "), Some("Globex Industries".to_string()));
        assert_eq!(standardize_brand(" - "), None);
    }

    #[test]
    fn test_bool_and_null_tokens() {
        assert_eq!(standardize_bool("YES"), Some(true));
        assert_eq!(standardize_bool("inactive"), Some(false));
        assert_eq!(standardize_bool("maybe"), None);
        assert!(is_null_token(" "));
        assert!(is_null_token("NaN"));
        assert!(!is_null_token("n/a"));
    }

    #[test]
    fn test_zip_float_artifact() {
        assert_eq!(strip_float_artifact("10001.0"), Some("10001".to_string()));
        assert_eq!(strip_float_artifact("02134"), Some("02134".to_string()));
        assert_eq!(strip_float_artifact("nan"), None);
    }

    #[test]
    fn test_standardizers_are_fixed_points() {
        let inputs = ["nyc", "Houston", "texas", "NY", "pending", "m", "Other", "toys", "grey", "s", "one size"];
        for raw in inputs {
            for f in [
                standardize_city as fn(&str) -> String,
                standardize_state,
                standardize_customer_status,
                standardize_gender,
                standardize_category,
                standardize_color,
                standardize_size,
                standardize_phone,
            ] {
                let once = f(raw);
                assert_eq!(f(&once), once, "not a fixed point for {raw:?}");
            }
        }
        let once = standardize_brand("acme_corp").unwrap();
        assert_eq!(standardize_brand(&once), Some(once.clone()));
    }
}
