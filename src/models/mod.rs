//! Data models for menuscrape.

mod item;
mod menu;
mod stats;
mod venue;

pub use item::{CatalogItem, DietaryFlags, ItemKey};
pub use menu::{
    parse_menu_date, slugify, Course, Day, Meal, NutrientKey, NutrientValue, NutritionFacts,
    RawIngredients, CHECKPOINT_DATE_FMT, MENU_DATE_FMT,
};
pub use stats::{FoundCounts, InsertedCounts, RunStats, VenueStats};
pub use venue::Venue;
