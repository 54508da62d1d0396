//! Parsed menu records: the shape produced by traversal and stored in the checkpoint.
//!
//! A [`Day`] owns its meals, a [`Meal`] owns its courses, and a [`Course`]
//! keeps two maps keyed by the item name as it appeared on the page: one
//! with the raw ingredient/diet/allergen rows and one with nutrition facts.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Date format used in the checkpoint artifact (day/month/year).
pub const CHECKPOINT_DATE_FMT: &str = "%d/%m/%Y";

/// Date format shown in the menu application's sub caption.
pub const MENU_DATE_FMT: &str = "%A, %B %d, %Y";

/// Parse a date as shown by the menu application, e.g. `Monday, October 19, 2026`.
pub fn parse_menu_date(label: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(label.trim(), MENU_DATE_FMT).ok()
}

/// One captured menu day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    #[serde(with = "checkpoint_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub meals: Vec<Meal>,
}

impl Day {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            meals: Vec::new(),
        }
    }

    /// A day is usable when enough meal tabs rendered.
    pub fn is_usable(&self, min_meals: usize) -> bool {
        self.meals.len() >= min_meals
    }

    /// Total number of items across all meals and courses.
    pub fn item_count(&self) -> usize {
        self.meals
            .iter()
            .flat_map(|m| m.courses.iter())
            .map(|c| c.ingredients.len())
            .sum()
    }
}

/// A meal tab (Breakfast, Lunch, Dinner, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub name: String,
    #[serde(default)]
    pub courses: Vec<Course>,
}

/// A course within a meal and the items listed under it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub name: String,
    /// Item name -> ingredient panel row data.
    #[serde(default)]
    pub ingredients: IndexMap<String, RawIngredients>,
    /// Item name -> nutrition facts pane.
    #[serde(default)]
    pub nutrition: IndexMap<String, NutritionFacts>,
}

/// Raw row data for one item in the ingredients panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawIngredients {
    /// Comma separated diet codes, e.g. `"V, GF"`.
    #[serde(default)]
    pub diets: String,
    #[serde(default)]
    pub ingredients: String,
    /// Comma separated allergen names without the `Allergens: ` prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allergens: Option<String>,
}

/// Nutrition facts as read from a pane, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionFacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving_size: Option<String>,
    #[serde(default)]
    pub nutrients: BTreeMap<NutrientKey, NutrientValue>,
}

impl NutritionFacts {
    pub fn get(&self, key: &NutrientKey) -> Option<&NutrientValue> {
        self.nutrients.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.serving_size.is_none() && self.nutrients.is_empty()
    }
}

/// An amount plus optional percent daily value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutrientValue {
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_daily_value: Option<i32>,
}

impl NutrientValue {
    pub fn new(amount: impl Into<String>, percent_daily_value: Option<i32>) -> Self {
        Self {
            amount: amount.into(),
            percent_daily_value,
        }
    }
}

/// Nutrient identifier derived from the label on the nutrition pane.
///
/// Well-known labels get their own variant so rounding rules can match on
/// them; anything else is kept as its slug.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NutrientKey {
    Calories,
    TotalFat,
    SaturatedFat,
    TransFat,
    Cholesterol,
    Sodium,
    TotalCarbohydrate,
    DietaryFiber,
    TotalSugars,
    Protein,
    VitaminD,
    VitaminA,
    VitaminC,
    Calcium,
    Iron,
    Potassium,
    Other(String),
}

impl NutrientKey {
    /// Build a key from a pane label such as `"- Saturated Fat"`.
    pub fn from_label(label: &str) -> Self {
        Self::from_slug(&slugify(label))
    }

    pub fn from_slug(slug: &str) -> Self {
        match slug {
            "calories" => Self::Calories,
            "total_fat" => Self::TotalFat,
            "saturated_fat" => Self::SaturatedFat,
            "trans_fat" => Self::TransFat,
            "cholesterol" => Self::Cholesterol,
            "sodium" => Self::Sodium,
            "total_carbohydrate" => Self::TotalCarbohydrate,
            "dietary_fiber" => Self::DietaryFiber,
            "total_sugars" => Self::TotalSugars,
            "protein" => Self::Protein,
            "vitamin_d" => Self::VitaminD,
            "vitamin_a" => Self::VitaminA,
            "vitamin_c" => Self::VitaminC,
            "calcium" => Self::Calcium,
            "iron" => Self::Iron,
            "potassium" => Self::Potassium,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Calories => "calories",
            Self::TotalFat => "total_fat",
            Self::SaturatedFat => "saturated_fat",
            Self::TransFat => "trans_fat",
            Self::Cholesterol => "cholesterol",
            Self::Sodium => "sodium",
            Self::TotalCarbohydrate => "total_carbohydrate",
            Self::DietaryFiber => "dietary_fiber",
            Self::TotalSugars => "total_sugars",
            Self::Protein => "protein",
            Self::VitaminD => "vitamin_d",
            Self::VitaminA => "vitamin_a",
            Self::VitaminC => "vitamin_c",
            Self::Calcium => "calcium",
            Self::Iron => "iron",
            Self::Potassium => "potassium",
            Self::Other(slug) => slug,
        }
    }
}

impl fmt::Display for NutrientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NutrientKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NutrientKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        // Older checkpoints stored the pane label verbatim.
        Ok(Self::from_label(&raw))
    }
}

/// Turn a pane label into a snake_case key.
///
/// `"- Total Sugars"` becomes `total_sugars`, `"Vitamin D"` becomes `vitamin_d`.
pub fn slugify(label: &str) -> String {
    let trimmed = label.trim().trim_start_matches(['-', ' ']);
    let mut slug = String::with_capacity(trimmed.len());
    let mut pending_sep = false;
    for ch in trimmed.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    slug
}

mod checkpoint_date {
    use super::{parse_menu_date, CHECKPOINT_DATE_FMT};
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(CHECKPOINT_DATE_FMT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, CHECKPOINT_DATE_FMT)
            .ok()
            .or_else(|| parse_menu_date(&raw))
            .ok_or_else(|| de::Error::custom(format!("unrecognized day date: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_labels() {
        assert_eq!(slugify("Total Fat"), "total_fat");
        assert_eq!(slugify("- Saturated Fat"), "saturated_fat");
        assert_eq!(slugify("  Vitamin D "), "vitamin_d");
        assert_eq!(slugify("Added Sugars (incl.)"), "added_sugars_incl");
    }

    #[test]
    fn test_nutrient_key_open_enumeration() {
        assert_eq!(NutrientKey::from_label("Sodium"), NutrientKey::Sodium);
        assert_eq!(
            NutrientKey::from_label("Added Sugars"),
            NutrientKey::Other("added_sugars".to_string())
        );
        assert_eq!(NutrientKey::Other("x_y".into()).as_str(), "x_y");
    }

    #[test]
    fn test_day_date_round_trips_in_checkpoint_format() {
        let day = Day::new(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        let json = serde_json::to_string(&day).unwrap();
        assert!(json.contains("\"19/10/2026\""));
        let back: Day = serde_json::from_str(&json).unwrap();
        assert_eq!(back, day);
    }

    #[test]
    fn test_course_items_keep_page_order() {
        let json = r#"{"name": "Entree", "ingredients": {
            "Zucchini Bake": {"diets": "V", "ingredients": "zucchini"},
            "Apple Crisp": {"diets": "V", "ingredients": "apple, oats"}
        }}"#;
        let course: Course = serde_json::from_str(json).unwrap();
        let names: Vec<&String> = course.ingredients.keys().collect();
        assert_eq!(names, vec!["Zucchini Bake", "Apple Crisp"]);

        let back = serde_json::to_string(&course).unwrap();
        assert!(back.find("Zucchini Bake") < back.find("Apple Crisp"));
    }

    #[test]
    fn test_day_accepts_menu_label_dates() {
        let day: Day =
            serde_json::from_str(r#"{"date": "Monday, October 19, 2026", "meals": []}"#).unwrap();
        assert_eq!(day.date, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
    }

    #[test]
    fn test_day_usability() {
        let mut day = Day::new(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        day.meals.push(Meal {
            name: "Lunch".into(),
            courses: vec![],
        });
        assert!(!day.is_usable(2));
        assert!(day.is_usable(1));
    }

    #[test]
    fn test_legacy_label_keys_deserialize() {
        let facts: NutritionFacts = serde_json::from_str(
            r#"{"nutrients": {"Total Fat": {"amount": "3 g", "percent_daily_value": 4}}}"#,
        )
        .unwrap();
        assert_eq!(
            facts.get(&NutrientKey::TotalFat),
            Some(&NutrientValue::new("3 g", Some(4)))
        );
    }
}
