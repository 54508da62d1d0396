//! Nutrition value normalization.
//!
//! Raw amounts are rounded to food-label conventions before they reach the
//! catalog. Every rule works on a [`Quantity`] parsed from strings such as
//! `"12.5 g"` and splits the value range into bands; a value rounded inside
//! a band never crosses into the band above it, which keeps each rule
//! idempotent.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::models::{NutrientKey, NutrientValue, NutritionFacts};

/// Error parsing a quantity string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,
    #[error("invalid number in quantity '{0}'")]
    InvalidNumber(String),
    #[error("non-finite number in quantity '{0}'")]
    NotFinite(String),
    #[error("quantity '{0}' is out of range")]
    OutOfRange(String),
}

/// A numeric amount with its unit, e.g. `12.5 g`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: String,
}

impl Quantity {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    fn with_value(&self, value: f64) -> Self {
        Self {
            value,
            unit: self.unit.clone(),
        }
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let number = parts.next().ok_or(QuantityError::Empty)?;
        let value = number
            .replace(',', "")
            .parse::<f64>()
            .map_err(|_| QuantityError::InvalidNumber(s.to_string()))?;
        if !value.is_finite() {
            return Err(QuantityError::NotFinite(s.to_string()));
        }
        let unit = parts.collect::<Vec<_>>().join(" ");
        Ok(Self { value, unit })
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_empty() {
            write!(f, "{}", format_number(self.value))
        } else {
            write!(f, "{} {}", format_number(self.value), self.unit)
        }
    }
}

/// Render a number without a trailing `.0`.
fn format_number(value: f64) -> String {
    let value = (value * 10_000.0).round() / 10_000.0;
    if value == 0.0 {
        // avoid "-0"
        return "0".to_string();
    }
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn round_increment(n: f64, increment: f64) -> f64 {
    (n / increment).round() * increment
}

/// Round to `increment`, staying strictly below `upper`.
fn round_below(n: f64, increment: f64, upper: f64) -> f64 {
    let rounded = round_increment(n, increment);
    if rounded >= upper {
        ((upper / increment).ceil() - 1.0) * increment
    } else {
        rounded
    }
}

/// Calories: 0 below 5, nearest 5 up to 50, nearest 10 above.
pub fn round_calories(n: f64) -> i64 {
    let rounded = if n < 5.0 {
        0.0
    } else if n <= 50.0 {
        round_increment(n, 5.0)
    } else {
        round_increment(n, 10.0)
    };
    rounded as i64
}

/// Total, saturated and trans fat.
pub fn round_fats(q: &Quantity) -> Quantity {
    let n = q.value;
    let v = if n < 0.5 {
        0.0
    } else if n < 5.0 {
        round_below(n, 0.5, 5.0)
    } else {
        round_increment(n, 1.0)
    };
    q.with_value(v)
}

/// Cholesterol. Between 2 and 5 mg we round to 1 mg instead of printing "less than 5 mg".
pub fn round_cholesterol(q: &Quantity) -> Quantity {
    let n = q.value;
    let v = if n < 2.0 {
        0.0
    } else if n < 5.0 {
        round_below(n, 1.0, 5.0)
    } else {
        round_increment(n, 5.0)
    };
    q.with_value(v)
}

/// Sodium and potassium.
pub fn round_sp(q: &Quantity) -> Quantity {
    let n = q.value;
    let v = if n < 5.0 {
        0.0
    } else if n < 140.0 {
        round_below(n, 5.0, 140.0)
    } else {
        round_increment(n, 10.0)
    };
    q.with_value(v)
}

/// Total carbohydrate, dietary fiber and total sugars.
pub fn round_tdt(q: &Quantity) -> Quantity {
    let n = q.value;
    // "less than 1 g" is reported as 0
    let v = if n < 1.0 { 0.0 } else { round_increment(n, 1.0) };
    q.with_value(v)
}

/// Protein.
pub fn round_protein(q: &Quantity) -> Quantity {
    round_tdt(q)
}

/// Vitamins and minerals are not rounded; formatting still trims zeros.
pub fn round_vm(q: &Quantity) -> Quantity {
    q.clone()
}

/// Which rounding rule applies to a nutrient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingRule {
    Calories,
    Fats,
    Cholesterol,
    SodiumPotassium,
    CarbFiberSugar,
    Protein,
    VitaminMineral,
    /// Unknown nutrient, kept verbatim.
    Passthrough,
}

impl RoundingRule {
    pub fn for_key(key: &NutrientKey) -> Self {
        match key {
            NutrientKey::Calories => Self::Calories,
            NutrientKey::TotalFat | NutrientKey::SaturatedFat | NutrientKey::TransFat => {
                Self::Fats
            }
            NutrientKey::Cholesterol => Self::Cholesterol,
            NutrientKey::Sodium | NutrientKey::Potassium => Self::SodiumPotassium,
            NutrientKey::TotalCarbohydrate
            | NutrientKey::DietaryFiber
            | NutrientKey::TotalSugars => Self::CarbFiberSugar,
            NutrientKey::Protein => Self::Protein,
            NutrientKey::VitaminD
            | NutrientKey::VitaminA
            | NutrientKey::VitaminC
            | NutrientKey::Calcium
            | NutrientKey::Iron => Self::VitaminMineral,
            NutrientKey::Other(_) => Self::Passthrough,
        }
    }

    pub fn apply(&self, q: &Quantity) -> Quantity {
        match self {
            Self::Calories => q.with_value(round_calories(q.value) as f64),
            Self::Fats => round_fats(q),
            Self::Cholesterol => round_cholesterol(q),
            Self::SodiumPotassium => round_sp(q),
            Self::CarbFiberSugar => round_tdt(q),
            Self::Protein => round_protein(q),
            Self::VitaminMineral => round_vm(q),
            Self::Passthrough => q.clone(),
        }
    }

    /// Parse, round and render an amount string.
    pub fn apply_str(&self, amount: &str) -> Result<String, QuantityError> {
        if *self == Self::Passthrough {
            return Ok(amount.to_string());
        }
        let q: Quantity = amount.parse()?;
        Ok(self.apply(&q).to_string())
    }
}

/// Parse and round a calorie amount such as `"1,250 kcal"` or `"250"`.
pub fn parse_calories(amount: &str) -> Result<i32, QuantityError> {
    let q: Quantity = amount.parse()?;
    i32::try_from(round_calories(q.value)).map_err(|_| QuantityError::OutOfRange(amount.to_string()))
}

/// Nutrition facts after rounding, ready for storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedNutrition {
    pub serving_size: Option<String>,
    pub calories: Option<i32>,
    /// Every other nutrient, keyed by slug.
    pub values: BTreeMap<NutrientKey, NutrientValue>,
}

/// Normalize one amount for `key`. Unparseable amounts are kept verbatim.
pub fn normalize_amount(key: &NutrientKey, amount: &str) -> String {
    match RoundingRule::for_key(key).apply_str(amount) {
        Ok(rounded) => rounded,
        Err(e) => {
            warn!("Keeping unnormalized {} amount: {}", key, e);
            amount.to_string()
        }
    }
}

/// Apply label rounding to a parsed nutrition pane.
pub fn standardize(facts: &NutritionFacts) -> NormalizedNutrition {
    let calories = facts
        .get(&NutrientKey::Calories)
        .and_then(|v| match parse_calories(&v.amount) {
            Ok(n) => Some(n),
            Err(e) => {
                warn!("Dropping calories: {}", e);
                None
            }
        });

    let values = facts
        .nutrients
        .iter()
        .filter(|(key, _)| **key != NutrientKey::Calories)
        .map(|(key, value)| {
            let amount = normalize_amount(key, &value.amount);
            (
                key.clone(),
                NutrientValue::new(amount, value.percent_daily_value),
            )
        })
        .collect();

    NormalizedNutrition {
        serving_size: facts.serving_size.clone(),
        calories,
        values,
    }
}
