//! Ingestion: checkpointed days into catalog rows.
//!
//! Preparation is pure: a [`Day`] becomes a [`DayBatch`] with canonical
//! names, derived flags, meal hours and rounded nutrition. Writing goes
//! through [`DieselCatalogRepository::ingest_day`], one transaction per day.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{Course, Day, DietaryFlags, ItemKey};
use crate::normalize::standardize;
use crate::overrides::{meal_hours, NameOverrides};
use crate::repository::{
    AsyncSqlitePool, DayBatch, DayReport, DieselCatalogRepository, DieselError,
    DieselVenueRepository, ItemBatch, MealBatch,
};
use crate::scrapers::CheckpointStore;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("venue '{0}' is not in the catalog")]
    UnknownVenue(String),

    #[error("database error: {0}")]
    Database(#[from] DieselError),
}

/// Totals for one venue's ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub venue_id: String,
    /// Days handed to the catalog.
    pub days: u64,
    /// Days dropped for having too few meals.
    pub unusable_days: u64,
    /// Days older than the catalog's last meal date.
    pub stale_days: u64,
    pub totals: DayReport,
    /// Last meal date in the catalog after the pass.
    pub last_date: Option<NaiveDate>,
}

/// Build the catalog batch for one day.
pub fn prepare_day(day: &Day, overrides: &NameOverrides) -> DayBatch {
    let meals = day
        .meals
        .iter()
        .map(|meal| {
            let name = overrides.meal(&meal.name);
            let hours = meal_hours(&name);
            let items = meal
                .courses
                .iter()
                .flat_map(|course| prepare_course(course, overrides))
                .collect();
            MealBatch {
                start_time: hours.map(|(start, _)| start.to_string()),
                end_time: hours.map(|(_, end)| end.to_string()),
                name,
                items,
            }
        })
        .collect();

    DayBatch {
        date: day.date,
        meals,
    }
}

fn prepare_course(course: &Course, overrides: &NameOverrides) -> Vec<ItemBatch> {
    let course_name = overrides.course(&course.name);

    course
        .ingredients
        .iter()
        .map(|(raw_name, raw)| {
            let name = overrides.item(raw_name);
            let (flags, unknown) = DietaryFlags::from_raw(&raw.diets, raw.allergens.as_deref());
            for allergen in unknown {
                warn!("Unknown allergen '{}' on {}", allergen, name);
            }

            let nutrition = course
                .nutrition
                .get(raw_name)
                .or_else(|| course.nutrition.get(&name))
                .filter(|facts| !facts.is_empty())
                .map(standardize);
            if nutrition.is_none() {
                debug!("No nutrition facts for {}", name);
            }

            ItemBatch {
                key: ItemKey {
                    name,
                    ingredients: raw.ingredients.clone(),
                    course: course_name.clone(),
                    flags,
                },
                nutrition,
            }
        })
        .collect()
}

/// Writes checkpointed days into the catalog.
#[derive(Clone)]
pub struct IngestService {
    venues: DieselVenueRepository,
    catalog: DieselCatalogRepository,
    overrides: NameOverrides,
    min_meals: usize,
}

impl IngestService {
    pub fn new(pool: AsyncSqlitePool, overrides: NameOverrides, min_meals: usize) -> Self {
        Self {
            venues: DieselVenueRepository::new(pool.clone()),
            catalog: DieselCatalogRepository::new(pool),
            overrides,
            min_meals,
        }
    }

    /// Ingest `days` for the venue with display name `venue_name`.
    ///
    /// Days before the venue's last stored meal date are skipped; meals that
    /// already exist on the remaining days are skipped by the repository.
    pub async fn ingest_venue(
        &self,
        venue_name: &str,
        days: &[Day],
    ) -> Result<IngestReport, IngestError> {
        let venue = self
            .venues
            .find_by_name(venue_name)
            .await?
            .ok_or_else(|| IngestError::UnknownVenue(venue_name.to_string()))?;
        let last = self.catalog.last_meal_date(&venue.id).await?;

        let mut report = IngestReport {
            venue_id: venue.id.clone(),
            last_date: last,
            ..Default::default()
        };

        for day in days {
            if !day.is_usable(self.min_meals) {
                debug!("{}: skipping {} with {} meal(s)", venue_name, day.date, day.meals.len());
                report.unusable_days += 1;
                continue;
            }
            if last.is_some_and(|l| day.date < l) {
                report.stale_days += 1;
                continue;
            }

            let batch = prepare_day(day, &self.overrides);
            let day_report = self.catalog.ingest_day(&venue.id, &batch).await?;
            report.totals.merge(&day_report);
            report.days += 1;
        }

        report.last_date = self.catalog.last_meal_date(&venue.id).await?;
        info!(
            "{}: ingested {} day(s), {} new meal(s), {} new item(s)",
            venue_name, report.days, report.totals.meals_inserted, report.totals.items_inserted
        );
        Ok(report)
    }

    /// Ingest every venue in the checkpoint, splitting combined venues.
    ///
    /// Venues missing from the catalog are logged and left out of the result.
    pub async fn ingest_checkpoint(
        &self,
        checkpoint: &CheckpointStore,
    ) -> Result<BTreeMap<String, IngestReport>, IngestError> {
        let mut reports = BTreeMap::new();
        let keys: Vec<String> = checkpoint.venue_names().map(str::to_string).collect();

        for key in keys {
            for part in self.overrides.split_venue(&key) {
                match self.ingest_venue(&part, checkpoint.days(&key)).await {
                    Ok(report) => {
                        reports.insert(part, report);
                    }
                    Err(IngestError::UnknownVenue(name)) => {
                        warn!("Skipping '{}': no such venue in the catalog", name);
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(reports)
    }

    pub fn catalog(&self) -> &DieselCatalogRepository {
        &self.catalog
    }

    pub fn venues(&self) -> &DieselVenueRepository {
        &self.venues
    }

    pub fn overrides(&self) -> &NameOverrides {
        &self.overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Meal, NutrientKey, NutrientValue, NutritionFacts, RawIngredients, Venue};
    use crate::repository::run_migrations;
    use tempfile::tempdir;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn course() -> Course {
        let mut course = Course {
            name: "Yale Bakery Dessert".into(),
            ..Default::default()
        };
        course.ingredients.insert(
            "Baker`s Brownie".into(),
            RawIngredients {
                diets: "V".into(),
                ingredients: "flour, cocoa, walnuts".into(),
                allergens: Some("Tree Nut, Wheat, Mystery".into()),
            },
        );
        let mut facts = NutritionFacts {
            serving_size: Some("1 each".into()),
            ..Default::default()
        };
        facts
            .nutrients
            .insert(NutrientKey::Calories, NutrientValue::new("252 kcal", None));
        facts
            .nutrients
            .insert(NutrientKey::Sodium, NutrientValue::new("139 mg", Some(6)));
        course.nutrition.insert("Baker`s Brownie".into(), facts);
        course
    }

    fn day(d: u32, meals: &[&str]) -> Day {
        Day {
            date: date(d),
            meals: meals
                .iter()
                .map(|name| Meal {
                    name: name.to_string(),
                    courses: vec![course()],
                })
                .collect(),
        }
    }

    #[test]
    fn test_prepare_day_canonicalizes() {
        let batch = prepare_day(&day(19, &["OC Dinner", "Lunch"]), &NameOverrides::default());

        let dinner = &batch.meals[0];
        assert_eq!(dinner.name, "Dinner");
        assert_eq!(dinner.start_time.as_deref(), Some("17:00"));
        assert_eq!(dinner.end_time.as_deref(), Some("19:30"));

        let item = &dinner.items[0];
        assert_eq!(item.key.name, "Baker's Brownie");
        assert_eq!(item.key.course, "Dessert");
        assert!(item.key.flags.tree_nut);
        assert!(item.key.flags.wheat);
        assert!(!item.key.flags.meat);
        assert!(item.key.flags.animal_products);

        let nutrition = item.nutrition.as_ref().unwrap();
        assert_eq!(nutrition.calories, Some(250));
        assert_eq!(nutrition.values[&NutrientKey::Sodium].amount, "135 mg");
    }

    #[test]
    fn test_prepare_day_unknown_meal_has_no_hours() {
        let batch = prepare_day(&day(19, &["Brunch"]), &NameOverrides::default());
        assert_eq!(batch.meals[0].start_time, None);
    }

    #[tokio::test]
    async fn test_ingest_venue_skips_unusable_and_existing() {
        let dir = tempdir().unwrap();
        let pool = AsyncSqlitePool::from_path(&dir.path().join("menus.db"));
        run_migrations(&pool).await.unwrap();
        DieselVenueRepository::new(pool.clone())
            .upsert(&Venue::new("BK", "Berkeley", "Berkeley"))
            .await
            .unwrap();
        let service = IngestService::new(pool, NameOverrides::default(), 2);

        let days = vec![day(19, &["Breakfast", "Lunch"]), day(20, &["Lunch"])];
        let first = service.ingest_venue("Berkeley", &days).await.unwrap();
        assert_eq!(first.days, 1);
        assert_eq!(first.unusable_days, 1);
        assert_eq!(first.totals.meals_inserted, 2);
        assert_eq!(first.totals.items_inserted, 1);
        assert_eq!(first.last_date, Some(date(19)));

        let again = service.ingest_venue("Berkeley", &days).await.unwrap();
        assert_eq!(again.totals.meals_inserted, 0);
        assert_eq!(again.totals.meals_skipped, 2);
        assert_eq!(service.catalog().item_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_venue() {
        let dir = tempdir().unwrap();
        let pool = AsyncSqlitePool::from_path(&dir.path().join("menus.db"));
        run_migrations(&pool).await.unwrap();
        let service = IngestService::new(pool, NameOverrides::default(), 2);

        let err = service.ingest_venue("Nowhere", &[]).await.unwrap_err();
        assert!(matches!(err, IngestError::UnknownVenue(name) if name == "Nowhere"));
    }
}
