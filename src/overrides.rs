//! Static override tables correcting inconsistent source labels.
//!
//! The menu application spells some meal, course, item and venue names
//! differently from the catalog. Built-in tables cover the known cases;
//! configuration can add more entries on top.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Extra override entries supplied through configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideConfig {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub meals: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub courses: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub items: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub venues: HashMap<String, String>,
}

impl OverrideConfig {
    pub fn is_default(&self) -> bool {
        self.meals.is_empty()
            && self.courses.is_empty()
            && self.items.is_empty()
            && self.venues.is_empty()
    }
}

/// Name canonicalization tables.
#[derive(Debug, Clone)]
pub struct NameOverrides {
    meals: HashMap<String, String>,
    courses: HashMap<String, String>,
    items: HashMap<String, String>,
    venues: HashMap<String, String>,
}

const MEAL_OVERRIDES: &[(&str, &str)] = &[
    ("OC Dinner", "Dinner"),
    // The source mislabels its lunch tab.
    ("breakfast", "Lunch"),
];

const COURSE_OVERRIDES: &[(&str, &str)] = &[
    ("Yale Bakery Dessert", "Dessert"),
    ("Smart Meals (must be ordered ahead)", "Smart Meals"),
];

const ITEM_OVERRIDES: &[(&str, &str)] = &[(
    "Nut-Free Basil Pesto (basil, canola oil, extra virgin olive oil, romano cheese, pasteurized sheep's milk, rennet, garlic, salt)",
    "Nut-Free Basil Pesto",
)];

/// Menu-application venue captions -> catalog display names.
const VENUE_OVERRIDES: &[(&str, &str)] = &[
    ("Franklin", "Benjamin Franklin"),
    ("Stiles", "Ezra Stiles"),
    ("Murray", "Pauli Murray"),
    ("Hopper", "Grace Hopper"),
    ("ESM", "Ezra Stiles/Morse"),
    ("JE", "Jonathan Edwards"),
];

/// Separators that join several venues sharing one menu.
const VENUE_SEPARATORS: &[&str] = &["/", " & ", " and "];

/// Suffix the menu application appends to residential venue captions.
const RESIDENTIAL_SUFFIX: &str = ", Residential";

fn table(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

impl Default for NameOverrides {
    fn default() -> Self {
        Self {
            meals: table(MEAL_OVERRIDES),
            courses: table(COURSE_OVERRIDES),
            items: table(ITEM_OVERRIDES),
            venues: table(VENUE_OVERRIDES),
        }
    }
}

impl NameOverrides {
    /// Built-in tables with configured entries layered on top.
    pub fn with_config(config: &OverrideConfig) -> Self {
        let mut overrides = Self::default();
        overrides.meals.extend(config.meals.clone());
        overrides.courses.extend(config.courses.clone());
        overrides.items.extend(config.items.clone());
        overrides.venues.extend(config.venues.clone());
        overrides
    }

    pub fn meal(&self, raw: &str) -> String {
        lookup(&self.meals, raw)
    }

    pub fn course(&self, raw: &str) -> String {
        lookup(&self.courses, raw)
    }

    /// Canonical item name; backticks in the source become apostrophes.
    pub fn item(&self, raw: &str) -> String {
        lookup(&self.items, raw).replace('`', "'")
    }

    /// Canonical venue name from a menu caption such as `"Berkeley, Residential"`.
    pub fn venue(&self, raw: &str) -> String {
        let name = raw.trim().replace(RESIDENTIAL_SUFFIX, "");
        lookup(&self.venues, &name)
    }

    /// Split a combined venue into its constituent canonical names.
    ///
    /// The caption is canonicalized first (so `ESM` expands before splitting),
    /// then each part is canonicalized on its own. A single venue yields a
    /// one-element list.
    pub fn split_venue(&self, raw: &str) -> Vec<String> {
        let name = self.venue(raw);
        let separator = VENUE_SEPARATORS.iter().find(|sep| name.contains(**sep));
        match separator {
            Some(sep) => name
                .split(sep)
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| self.venue(part))
                .collect(),
            None => vec![name],
        }
    }

    /// True when the caption names more than one venue.
    pub fn is_combined_venue(&self, raw: &str) -> bool {
        self.split_venue(raw).len() > 1
    }
}

fn lookup(table: &HashMap<String, String>, raw: &str) -> String {
    table
        .get(raw)
        .cloned()
        .unwrap_or_else(|| raw.to_string())
}

/// Serving window assigned to a canonical meal name, as `HH:MM` strings.
pub fn meal_hours(meal_name: &str) -> Option<(&'static str, &'static str)> {
    match meal_name {
        "Breakfast" => Some(("08:00", "10:30")),
        "Lunch" => Some(("11:30", "14:00")),
        name if name.contains("Dinner") => Some(("17:00", "19:30")),
        _ => None,
    }
}
