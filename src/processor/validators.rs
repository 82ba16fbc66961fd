//! Cross-field checks and numeric range rules.
//!
//! Validators either return a corrected value or a boolean audit flag; none of
//! them fail.

use anyhow::Result;
use regex::Regex;

/// Absolute tolerance when comparing a stated order total with the recomputed one.
pub const TOTAL_TOLERANCE: f64 = 1.0;
const TOTAL_RELATIVE_TOLERANCE: f64 = 1e-5;
/// Fraction of the line value kept when a discount exceeds it.
pub const DISCOUNT_PENALTY_FACTOR: f64 = 0.5;
pub const MAX_RATING: f64 = 5.0;

/// Compiled patterns shared by the cleaners.
pub struct PatternRules {
    email: Regex,
    dimensions: Regex,
}

impl PatternRules {
    pub fn new() -> Result<Self> {
        Ok(PatternRules {
            email: Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")?,
            dimensions: Regex::new(r"^\d+x\d+x\d+$")?,
        })
    }

    /// Invalid addresses become missing rather than being reported per row.
    pub fn validate_email(&self, email: Option<&str>) -> Option<String> {
        email
            .filter(|e| self.email.is_match(e))
            .map(str::to_string)
    }

    /// Keeps `LxWxH` strings of whole numbers; anything else is missing.
    pub fn validate_dimensions(&self, dimensions: Option<&str>) -> Option<String> {
        dimensions
            .filter(|d| self.dimensions.is_match(d))
            .map(str::to_string)
    }
}

/// Outcome of reconciling a stated age against a birth year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgeCheck {
    Unchanged(Option<f64>),
    Corrected(f64),
    Derived(f64),
}

impl AgeCheck {
    pub fn value(&self) -> Option<f64> {
        match self {
            AgeCheck::Unchanged(age) => *age,
            AgeCheck::Corrected(age) | AgeCheck::Derived(age) => Some(*age),
        }
    }
}

/// A stated age more than a year away from `current_year - birth_year` is replaced;
/// a missing age is derived. Rows without a birth year are left alone.
pub fn reconcile_age(age: Option<f64>, birth_year: Option<i32>, current_year: i32) -> AgeCheck {
    let Some(birth_year) = birth_year else {
        return AgeCheck::Unchanged(age);
    };
    let calculated = f64::from(current_year - birth_year);
    match age {
        Some(stated) if (calculated - stated).abs() > 1.0 => AgeCheck::Corrected(calculated),
        Some(stated) => AgeCheck::Unchanged(Some(stated)),
        None => AgeCheck::Derived(calculated),
    }
}

/// Financial fields of one order line.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrderAmounts {
    pub unit_price: Option<f64>,
    pub quantity: Option<f64>,
    pub shipping_cost: Option<f64>,
    pub tax: Option<f64>,
    pub discount: Option<f64>,
}

impl OrderAmounts {
    pub fn line_value(&self) -> Option<f64> {
        Some(self.unit_price? * self.quantity?)
    }

    /// `unit_price * quantity + tax + shipping_cost - discount`; missing if any input is.
    pub fn expected_total(&self) -> Option<f64> {
        Some(self.line_value()? + self.tax? + self.shipping_cost? - self.discount?)
    }

    /// The order total net of freight and tax, allocated to the line item.
    pub fn net_amount(&self) -> Option<f64> {
        Some(self.expected_total()? - self.shipping_cost? - self.tax?)
    }

    /// Applies the non-negativity rule and the discount cap. Returns whether
    /// the discount was capped and how many fields had their sign flipped.
    pub fn enforce_ranges(&mut self) -> (bool, usize) {
        let mut flipped = 0;
        for field in [
            &mut self.unit_price,
            &mut self.quantity,
            &mut self.shipping_cost,
            &mut self.tax,
            &mut self.discount,
        ] {
            if let Some(v) = field.as_mut().filter(|v| **v < 0.0) {
                *v = v.abs();
                flipped += 1;
            }
        }
        let capped = match (self.discount, self.line_value()) {
            (Some(discount), Some(max)) => match cap_discount(discount, max) {
                Some(penalised) => {
                    self.discount = Some(penalised);
                    true
                }
                None => false,
            },
            _ => false,
        };
        (capped, flipped)
    }
}

/// `numpy.isclose` semantics with the pipeline's absolute tolerance. Missing
/// values never compare close.
pub fn totals_close(stated: Option<f64>, expected: Option<f64>) -> bool {
    match (stated, expected) {
        (Some(a), Some(b)) => (a - b).abs() <= TOTAL_TOLERANCE + TOTAL_RELATIVE_TOLERANCE * b.abs(),
        _ => false,
    }
}

/// Returns the penalised discount when it exceeds the line value.
pub fn cap_discount(discount: f64, line_value: f64) -> Option<f64> {
    if discount > line_value {
        Some(line_value * DISCOUNT_PENALTY_FACTOR)
    } else {
        None
    }
}

/// Missing on either side counts as a conflict.
pub fn quantity_conflict(quantity: Option<f64>, qty: Option<f64>) -> bool {
    quantity != qty
}

pub fn price_in_range(price: Option<f64>) -> Option<f64> {
    price.filter(|p| *p >= 0.0)
}

pub fn stock_in_range(stock: Option<f64>) -> Option<f64> {
    stock.map(|s| if s < 0.0 { 0.0 } else { s })
}

pub fn rating_in_range(rating: Option<f64>) -> Option<f64> {
    rating.filter(|r| (0.0..=MAX_RATING).contains(r))
}

pub fn final_category(category: Option<&str>, product_category: Option<&str>) -> Option<String> {
    category.or(product_category).map(str::to_string)
}

pub fn category_mismatch(category: Option<&str>, product_category: Option<&str>) -> bool {
    matches!((category, product_category), (Some(a), Some(b)) if a != b)
}

/// An active product must have both a price and a stock quantity.
pub fn active_flag_issue(is_active: Option<bool>, price: Option<f64>, stock_quantity: Option<f64>) -> bool {
    is_active == Some(true) && (price.is_none() || stock_quantity.is_none())
}
