//! Catalog writes: meals, deduplicated items, meal links and nutrition.
//!
//! Items are identified by the full [`ItemKey`]. A lookup that misses is
//! retried with the tree-nut flag inverted, because older rows were written
//! without tree-nut information; a hit there is reused and its flag becomes
//! the OR of stored and observed.

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::{debug, info};

use super::diesel_models::{
    ItemRecord, LastInsertRowId, MealRecord, NewItem, NewMeal, NutritionRecord,
    NutritionValueRecord,
};
use super::diesel_pool::{AsyncSqliteConnection, AsyncSqlitePool, DieselError};
use super::util::{format_date, parse_date};
use crate::models::{CatalogItem, ItemKey};
use crate::normalize::NormalizedNutrition;
use crate::schema::{items, meal_items, meals, nutrition, nutrition_values};

/// One day's worth of canonicalized meals for a venue.
#[derive(Debug, Clone, PartialEq)]
pub struct DayBatch {
    pub date: NaiveDate,
    pub meals: Vec<MealBatch>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MealBatch {
    pub name: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub items: Vec<ItemBatch>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemBatch {
    pub key: ItemKey,
    pub nutrition: Option<NormalizedNutrition>,
}

/// What a [`DieselCatalogRepository::ingest_day`] call wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayReport {
    pub meals_inserted: u64,
    pub meals_skipped: u64,
    pub items_inserted: u64,
    pub items_reused: u64,
    pub tree_nut_upgrades: u64,
}

impl DayReport {
    pub fn merge(&mut self, other: &DayReport) {
        self.meals_inserted += other.meals_inserted;
        self.meals_skipped += other.meals_skipped;
        self.items_inserted += other.items_inserted;
        self.items_reused += other.items_reused;
        self.tree_nut_upgrades += other.tree_nut_upgrades;
    }
}

/// Per-venue catalog coverage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueCoverage {
    pub venue_id: String,
    pub meals: i64,
    pub last_date: Option<NaiveDate>,
}

#[derive(Clone)]
pub struct DieselCatalogRepository {
    pool: AsyncSqlitePool,
}

impl DieselCatalogRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Date of the venue's latest stored meal.
    pub async fn last_meal_date(&self, venue_id: &str) -> Result<Option<NaiveDate>, DieselError> {
        let mut conn = self.pool.get().await?;

        let last: Option<String> = meals::table
            .filter(meals::venue_id.eq(venue_id))
            .select(diesel::dsl::max(meals::date))
            .first(&mut conn)
            .await?;
        Ok(last.as_deref().and_then(parse_date))
    }

    /// Meal count and latest date for every venue with meals.
    pub async fn coverage(&self) -> Result<Vec<VenueCoverage>, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::{count_star, max};
        let rows: Vec<(String, Option<String>, i64)> = meals::table
            .group_by(meals::venue_id)
            .select((meals::venue_id, max(meals::date), count_star()))
            .order(meals::venue_id.asc())
            .load(&mut conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(venue_id, last, meals)| VenueCoverage {
                venue_id,
                meals,
                last_date: last.as_deref().and_then(parse_date),
            })
            .collect())
    }

    /// Meals stored for a venue on a date, by name.
    pub async fn meals_on(
        &self,
        venue_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<MealRecord>, DieselError> {
        let mut conn = self.pool.get().await?;

        meals::table
            .filter(meals::venue_id.eq(venue_id))
            .filter(meals::date.eq(format_date(date)))
            .order(meals::name.asc())
            .load(&mut conn)
            .await
    }

    /// Items linked to a meal.
    pub async fn items_for_meal(&self, meal_id: i32) -> Result<Vec<CatalogItem>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<ItemRecord> = items::table
            .inner_join(meal_items::table)
            .filter(meal_items::meal_id.eq(meal_id))
            .select(ItemRecord::as_select())
            .order(items::id.asc())
            .load(&mut conn)
            .await?;
        Ok(records.into_iter().map(CatalogItem::from).collect())
    }

    /// All catalog items whose name matches.
    pub async fn items_named(&self, name: &str) -> Result<Vec<CatalogItem>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<ItemRecord> = items::table
            .filter(items::name.eq(name))
            .order(items::id.asc())
            .load(&mut conn)
            .await?;
        Ok(records.into_iter().map(CatalogItem::from).collect())
    }

    pub async fn item_count(&self) -> Result<i64, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        items::table.select(count_star()).first(&mut conn).await
    }

    /// Stored nutrition header and values for an item.
    pub async fn nutrition_for(
        &self,
        item_id: i32,
    ) -> Result<Option<(NutritionRecord, Vec<NutritionValueRecord>)>, DieselError> {
        let mut conn = self.pool.get().await?;

        let Some(header) = nutrition::table
            .find(item_id)
            .first::<NutritionRecord>(&mut conn)
            .await
            .optional()?
        else {
            return Ok(None);
        };
        let values = nutrition_values::table
            .filter(nutrition_values::item_id.eq(item_id))
            .order(nutrition_values::nutrient.asc())
            .load::<NutritionValueRecord>(&mut conn)
            .await?;
        Ok(Some((header, values)))
    }

    /// Write one day for a venue inside a single transaction.
    ///
    /// Meals already present for (venue, name, date) are skipped with
    /// their items.
    pub async fn ingest_day(
        &self,
        venue_id: &str,
        batch: &DayBatch,
    ) -> Result<DayReport, DieselError> {
        let mut conn = self.pool.get().await?;
        let date = format_date(batch.date);

        let report = conn
            .transaction(|conn| {
                Box::pin(async move {
                    let mut report = DayReport::default();

                    for meal in &batch.meals {
                        let existing: Option<i32> = meals::table
                            .filter(meals::venue_id.eq(venue_id))
                            .filter(meals::name.eq(&meal.name))
                            .filter(meals::date.eq(&date))
                            .select(meals::id)
                            .first(conn)
                            .await
                            .optional()?;
                        if existing.is_some() {
                            debug!("{} {} on {} already stored", venue_id, meal.name, date);
                            report.meals_skipped += 1;
                            continue;
                        }

                        diesel::insert_into(meals::table)
                            .values(NewMeal {
                                venue_id,
                                name: &meal.name,
                                date: &date,
                                start_time: meal.start_time.as_deref(),
                                end_time: meal.end_time.as_deref(),
                            })
                            .execute(conn)
                            .await?;
                        let meal_id = last_insert_rowid(conn).await?;
                        report.meals_inserted += 1;

                        for item in &meal.items {
                            let item_id = find_or_insert_item(conn, item, &mut report).await?;
                            diesel::insert_or_ignore_into(meal_items::table)
                                .values((
                                    meal_items::meal_id.eq(meal_id),
                                    meal_items::item_id.eq(item_id),
                                ))
                                .execute(conn)
                                .await?;
                        }
                    }

                    Ok::<_, DieselError>(report)
                })
            })
            .await?;

        info!(
            "{} {}: {} meals inserted, {} skipped, {} new items",
            venue_id, batch.date, report.meals_inserted, report.meals_skipped, report.items_inserted
        );
        Ok(report)
    }
}

impl From<ItemRecord> for CatalogItem {
    fn from(record: ItemRecord) -> Self {
        CatalogItem {
            id: record.id,
            key: record.key(),
        }
    }
}

async fn last_insert_rowid(conn: &mut AsyncSqliteConnection) -> Result<i32, DieselError> {
    let row: LastInsertRowId = diesel::sql_query("SELECT last_insert_rowid()")
        .get_result(conn)
        .await?;
    i32::try_from(row.id).map_err(super::util::to_diesel_error)
}

/// Exact composite-key lookup.
async fn find_item(
    conn: &mut AsyncSqliteConnection,
    key: &ItemKey,
) -> Result<Option<ItemRecord>, DieselError> {
    let f = &key.flags;
    items::table
        .filter(items::name.eq(&key.name))
        .filter(items::ingredients.eq(&key.ingredients))
        .filter(items::course.eq(&key.course))
        .filter(items::meat.eq(f.meat))
        .filter(items::animal_products.eq(f.animal_products))
        .filter(items::alcohol.eq(f.alcohol))
        .filter(items::tree_nut.eq(f.tree_nut))
        .filter(items::shellfish.eq(f.shellfish))
        .filter(items::peanuts.eq(f.peanuts))
        .filter(items::dairy.eq(f.dairy))
        .filter(items::egg.eq(f.egg))
        .filter(items::pork.eq(f.pork))
        .filter(items::fish.eq(f.fish))
        .filter(items::soy.eq(f.soy))
        .filter(items::wheat.eq(f.wheat))
        .filter(items::gluten.eq(f.gluten))
        .filter(items::coconut.eq(f.coconut))
        .order(items::id.asc())
        .first::<ItemRecord>(conn)
        .await
        .optional()
}

async fn find_or_insert_item(
    conn: &mut AsyncSqliteConnection,
    item: &ItemBatch,
    report: &mut DayReport,
) -> Result<i32, DieselError> {
    if let Some(record) = find_item(conn, &item.key).await? {
        report.items_reused += 1;
        return Ok(record.id);
    }

    if let Some(record) = find_item(conn, &item.key.with_tree_nut_inverted()).await? {
        if item.key.flags.tree_nut && !record.tree_nut {
            diesel::update(items::table.find(record.id))
                .set(items::tree_nut.eq(true))
                .execute(conn)
                .await?;
            report.tree_nut_upgrades += 1;
            info!("Set tree_nut on existing item {} ({})", record.id, record.name);
        }
        report.items_reused += 1;
        return Ok(record.id);
    }

    diesel::insert_into(items::table)
        .values(NewItem::from(&item.key))
        .execute(conn)
        .await?;
    let item_id = last_insert_rowid(conn).await?;
    report.items_inserted += 1;

    if let Some(facts) = &item.nutrition {
        insert_nutrition(conn, item_id, facts).await?;
    }
    Ok(item_id)
}

async fn insert_nutrition(
    conn: &mut AsyncSqliteConnection,
    item_id: i32,
    facts: &NormalizedNutrition,
) -> Result<(), DieselError> {
    diesel::insert_into(nutrition::table)
        .values(NutritionRecord {
            item_id,
            serving_size: facts.serving_size.clone(),
            calories: facts.calories,
        })
        .execute(conn)
        .await?;

    let values: Vec<NutritionValueRecord> = facts
        .values
        .iter()
        .map(|(key, value)| NutritionValueRecord {
            item_id,
            nutrient: key.as_str().to_string(),
            amount: value.amount.clone(),
            percent_daily_value: value.percent_daily_value,
        })
        .collect();
    if !values.is_empty() {
        diesel::insert_into(nutrition_values::table)
            .values(&values)
            .execute(conn)
            .await?;
    }
    Ok(())
}
