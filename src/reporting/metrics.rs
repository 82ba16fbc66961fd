use crate::processor::frame::{bool_values, has_column, number_values, optional_text_values, text_values};
use crate::processor::quality::round2;
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Customer status counted as retained.
const ACTIVE_STATUS: &str = "Active";
const REVENUE_TREND_MONTHS: usize = 6;
const TOP_PRODUCTS: usize = 5;

/// Cleaned tables the metrics are computed from.
pub struct MetricInputs<'a> {
    pub customers: &'a DataFrame,
    pub orders: &'a DataFrame,
    pub order_items: &'a DataFrame,
    pub products: &'a DataFrame,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BusinessMetrics {
    pub total_customers: usize,
    pub total_orders: usize,
    pub total_revenue: f64,
    pub avg_order_value: f64,
    pub active_customers: usize,
    pub customer_retention_rate: f64,
    pub total_products: usize,
    pub active_products: usize,
    pub inactive_products: usize,
    /// Revenue per `YYYY-MM`, most recent months only.
    pub monthly_revenue: BTreeMap<String, f64>,
    /// Average `total_spent` per customer segment.
    pub customer_lifetime_value: BTreeMap<String, f64>,
    pub top_products: Vec<ProductRevenue>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProductRevenue {
    pub product_id: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QualityMetrics {
    pub customer_completeness: BTreeMap<String, f64>,
    pub product_completeness: BTreeMap<String, f64>,
    pub category_mismatches: usize,
    pub active_flag_issues: usize,
}

/// The only document handed to the reporting layer.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineMetrics {
    pub generated_at: DateTime<Utc>,
    pub business: BusinessMetrics,
    pub quality: QualityMetrics,
}

impl PipelineMetrics {
    pub fn compute(inputs: &MetricInputs<'_>) -> Result<Self> {
        Ok(PipelineMetrics {
            generated_at: Utc::now(),
            business: business_metrics(inputs)?,
            quality: quality_metrics(inputs)?,
        })
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 { 0.0 } else { round2(part as f64 / whole as f64 * 100.0) }
}

pub fn business_metrics(inputs: &MetricInputs<'_>) -> Result<BusinessMetrics> {
    let totals: Vec<f64> = number_values(inputs.orders, "order_total")?.into_iter().flatten().collect();
    let total_revenue: f64 = totals.iter().sum();
    let avg_order_value = if totals.is_empty() { 0.0 } else { total_revenue / totals.len() as f64 };

    let total_customers = inputs.customers.height();
    let active_customers = text_values(inputs.customers, "status")?
        .iter()
        .filter(|s| s.as_deref() == Some(ACTIVE_STATUS))
        .count();

    let active_flags = bool_values(inputs.products, "is_active")?;

    Ok(BusinessMetrics {
        total_customers,
        total_orders: inputs.orders.height(),
        total_revenue: round2(total_revenue),
        avg_order_value: round2(avg_order_value),
        active_customers,
        customer_retention_rate: percentage(active_customers, total_customers),
        total_products: inputs.products.height(),
        active_products: active_flags.iter().filter(|f| **f == Some(true)).count(),
        inactive_products: active_flags.iter().filter(|f| **f == Some(false)).count(),
        monthly_revenue: monthly_revenue(inputs.orders)?,
        customer_lifetime_value: lifetime_value_by_segment(inputs.customers)?,
        top_products: top_products(inputs.order_items)?,
    })
}

fn monthly_revenue(orders: &DataFrame) -> Result<BTreeMap<String, f64>> {
    let dates = text_values(orders, "order_date")?;
    let totals = number_values(orders, "order_total")?;

    let mut by_month: BTreeMap<String, f64> = BTreeMap::new();
    for (date, total) in dates.iter().zip(totals) {
        let month = date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(|d| d.format("%Y-%m").to_string());
        if let (Some(month), Some(total)) = (month, total) {
            *by_month.entry(month).or_insert(0.0) += total;
        }
    }

    let skip = by_month.len().saturating_sub(REVENUE_TREND_MONTHS);
    Ok(by_month.into_iter().skip(skip).map(|(m, v)| (m, round2(v))).collect())
}

fn lifetime_value_by_segment(customers: &DataFrame) -> Result<BTreeMap<String, f64>> {
    let segments = text_values(customers, "segment")?;
    let spent = number_values(customers, "total_spent")?;

    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for (segment, spent) in segments.into_iter().zip(spent) {
        if let (Some(segment), Some(spent)) = (segment, spent) {
            let entry = sums.entry(segment).or_insert((0.0, 0));
            entry.0 += spent;
            entry.1 += 1;
        }
    }
    Ok(sums
        .into_iter()
        .map(|(segment, (sum, n))| (segment, round2(sum / n as f64)))
        .collect())
}

fn top_products(order_items: &DataFrame) -> Result<Vec<ProductRevenue>> {
    let products = text_values(order_items, "product_id")?;
    let amounts = number_values(order_items, "total_amount")?;

    let mut revenue: HashMap<String, f64> = HashMap::new();
    for (product, amount) in products.into_iter().zip(amounts) {
        if let (Some(product), Some(amount)) = (product, amount) {
            *revenue.entry(product).or_insert(0.0) += amount;
        }
    }

    let mut ranked: Vec<ProductRevenue> = revenue
        .into_iter()
        .map(|(product_id, revenue)| ProductRevenue { product_id, revenue: round2(revenue) })
        .collect();
    ranked.sort_by(|a, b| {
        b.revenue
            .total_cmp(&a.revenue)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    ranked.truncate(TOP_PRODUCTS);
    Ok(ranked)
}

fn completeness(df: &DataFrame, columns: &[(&str, &str)]) -> Result<BTreeMap<String, f64>> {
    let mut out = BTreeMap::new();
    for (label, column) in columns {
        let present = optional_text_values(df, column)?.iter().filter(|v| v.is_some()).count();
        out.insert(label.to_string(), percentage(present, df.height()));
    }
    Ok(out)
}

fn count_true(df: &DataFrame, column: &str) -> Result<usize> {
    if !has_column(df, column) {
        return Ok(0);
    }
    Ok(bool_values(df, column)?.iter().filter(|f| **f == Some(true)).count())
}

pub fn quality_metrics(inputs: &MetricInputs<'_>) -> Result<QualityMetrics> {
    Ok(QualityMetrics {
        customer_completeness: completeness(
            inputs.customers,
            &[("email", "email"), ("phone", "phone"), ("address", "address")],
        )?,
        product_completeness: completeness(
            inputs.products,
            &[("description", "description"), ("category", "final_category"), ("brand", "brand")],
        )?,
        category_mismatches: count_true(inputs.products, "category_mismatch")?,
        active_flag_issues: count_true(inputs.products, "is_active_flag_issue")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::frame::{frame_from_text_columns, set_bools};

    fn text(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    fn fixtures() -> (DataFrame, DataFrame, DataFrame, DataFrame) {
        let customers = frame_from_text_columns(vec![
            ("status", text(&[Some("Active"), Some("Inactive"), Some("Active"), Some("Pending")])),
            ("segment", text(&[Some("VIP"), Some("VIP"), Some("Regular"), None])),
            ("total_spent", text(&[Some("100"), Some("300"), Some("50"), Some("10")])),
            ("email", text(&[Some("a@x.com"), None, Some("c@x.com"), Some("d@x.com")])),
            ("phone", text(&[Some("1"), Some("2"), Some("3"), Some("4")])),
            ("address", text(&[None, None, Some("x"), Some("y")])),
        ])
        .unwrap();
        let orders = frame_from_text_columns(vec![
            ("order_date", text(&[Some("2024-01-05"), Some("2024-01-20"), Some("2024-02-01"), None])),
            ("order_total", text(&[Some("10"), Some("20"), Some("30"), Some("40")])),
        ])
        .unwrap();
        let items = frame_from_text_columns(vec![
            ("product_id", text(&[Some("P1"), Some("P2"), Some("P1")])),
            ("total_amount", text(&[Some("5"), Some("7"), Some("4")])),
        ])
        .unwrap();
        let mut products = frame_from_text_columns(vec![
            ("description", text(&[Some("a"), None])),
            ("final_category", text(&[Some("Toys"), Some("Books")])),
            ("brand", text(&[None, None])),
        ])
        .unwrap();
        set_bools(&mut products, "is_active", vec![Some(true), None]).unwrap();
        set_bools(&mut products, "category_mismatch", vec![Some(true), Some(false)]).unwrap();
        set_bools(&mut products, "is_active_flag_issue", vec![Some(false), Some(false)]).unwrap();
        (customers, orders, items, products)
    }

    #[test]
    fn test_business_metrics() {
        let (customers, orders, order_items, products) = fixtures();
        let inputs = MetricInputs {
            customers: &customers,
            orders: &orders,
            order_items: &order_items,
            products: &products,
        };
        let metrics = business_metrics(&inputs).unwrap();

        assert_eq!(metrics.total_orders, 4);
        assert_eq!(metrics.total_revenue, 100.0);
        assert_eq!(metrics.avg_order_value, 25.0);
        assert_eq!(metrics.active_customers, 2);
        assert_eq!(metrics.customer_retention_rate, 50.0);
        assert_eq!(metrics.active_products, 1);
        assert_eq!(metrics.inactive_products, 0);
        assert_eq!(metrics.monthly_revenue.get("2024-01"), Some(&30.0));
        assert_eq!(metrics.monthly_revenue.get("2024-02"), Some(&30.0));
        assert_eq!(metrics.customer_lifetime_value.get("VIP"), Some(&200.0));
        assert_eq!(
            metrics.top_products[0],
            ProductRevenue {
                product_id: "P1".to_string(),
                revenue: 9.0,
            }
        );
    }

    #[test]
    fn test_quality_metrics() {
        let (customers, orders, order_items, products) = fixtures();
        let inputs = MetricInputs {
            customers: &customers,
            orders: &orders,
            order_items: &order_items,
            products: &products,
        };
        let metrics = quality_metrics(&inputs).unwrap();

        assert_eq!(metrics.customer_completeness["email"], 75.0);
        assert_eq!(metrics.customer_completeness["address"], 50.0);
        assert_eq!(metrics.product_completeness["brand"], 0.0);
        assert_eq!(metrics.product_completeness["category"], 100.0);
        assert_eq!(metrics.category_mismatches, 1);
        assert_eq!(metrics.active_flag_issues, 0);
    }

    #[test]
    fn test_empty_tables_do_not_divide_by_zero() {
        let customers = frame_from_text_columns(vec![
            ("status", vec![]),
            ("segment", vec![]),
            ("total_spent", vec![]),
        ])
        .unwrap();
        let orders = frame_from_text_columns(vec![("order_date", vec![]), ("order_total", vec![])]).unwrap();
        let items = frame_from_text_columns(vec![("product_id", vec![]), ("total_amount", vec![])]).unwrap();
        let products = frame_from_text_columns(vec![("is_active", vec![])]).unwrap();
        let inputs = MetricInputs {
            customers: &customers,
            orders: &orders,
            order_items: &items,
            products: &products,
        };

        let metrics = business_metrics(&inputs).unwrap();
        assert_eq!(metrics.avg_order_value, 0.0);
        assert_eq!(metrics.customer_retention_rate, 0.0);
    }
}
