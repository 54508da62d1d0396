//! Diesel ORM models for catalog tables.

use diesel::prelude::*;
use diesel::sql_types::BigInt;

use crate::models::{DietaryFlags, ItemKey};
use crate::schema;

/// Venue record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::venues)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct VenueRecord {
    pub id: String,
    pub name: String,
    pub nickname: String,
    pub is_open: bool,
    pub occupancy: i32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub updated_at: String,
}

/// Meal record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::meals)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MealRecord {
    pub id: i32,
    pub venue_id: String,
    pub name: String,
    pub date: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// New meal for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::meals)]
pub struct NewMeal<'a> {
    pub venue_id: &'a str,
    pub name: &'a str,
    pub date: &'a str,
    pub start_time: Option<&'a str>,
    pub end_time: Option<&'a str>,
}

/// Item record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::items)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ItemRecord {
    pub id: i32,
    pub name: String,
    pub ingredients: String,
    pub course: String,
    pub meat: bool,
    pub animal_products: bool,
    pub alcohol: bool,
    pub tree_nut: bool,
    pub shellfish: bool,
    pub peanuts: bool,
    pub dairy: bool,
    pub egg: bool,
    pub pork: bool,
    pub fish: bool,
    pub soy: bool,
    pub wheat: bool,
    pub gluten: bool,
    pub coconut: bool,
}

impl ItemRecord {
    pub fn key(&self) -> ItemKey {
        ItemKey {
            name: self.name.clone(),
            ingredients: self.ingredients.clone(),
            course: self.course.clone(),
            flags: DietaryFlags {
                meat: self.meat,
                animal_products: self.animal_products,
                alcohol: self.alcohol,
                tree_nut: self.tree_nut,
                shellfish: self.shellfish,
                peanuts: self.peanuts,
                dairy: self.dairy,
                egg: self.egg,
                pork: self.pork,
                fish: self.fish,
                soy: self.soy,
                wheat: self.wheat,
                gluten: self.gluten,
                coconut: self.coconut,
            },
        }
    }
}

/// New item for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::items)]
pub struct NewItem<'a> {
    pub name: &'a str,
    pub ingredients: &'a str,
    pub course: &'a str,
    pub meat: bool,
    pub animal_products: bool,
    pub alcohol: bool,
    pub tree_nut: bool,
    pub shellfish: bool,
    pub peanuts: bool,
    pub dairy: bool,
    pub egg: bool,
    pub pork: bool,
    pub fish: bool,
    pub soy: bool,
    pub wheat: bool,
    pub gluten: bool,
    pub coconut: bool,
}

impl<'a> From<&'a ItemKey> for NewItem<'a> {
    fn from(key: &'a ItemKey) -> Self {
        let f = &key.flags;
        Self {
            name: &key.name,
            ingredients: &key.ingredients,
            course: &key.course,
            meat: f.meat,
            animal_products: f.animal_products,
            alcohol: f.alcohol,
            tree_nut: f.tree_nut,
            shellfish: f.shellfish,
            peanuts: f.peanuts,
            dairy: f.dairy,
            egg: f.egg,
            pork: f.pork,
            fish: f.fish,
            soy: f.soy,
            wheat: f.wheat,
            gluten: f.gluten,
            coconut: f.coconut,
        }
    }
}

/// Nutrition header row.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = schema::nutrition)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NutritionRecord {
    pub item_id: i32,
    pub serving_size: Option<String>,
    pub calories: Option<i32>,
}

/// One nutrient amount for an item.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = schema::nutrition_values)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NutritionValueRecord {
    pub item_id: i32,
    pub nutrient: String,
    pub amount: String,
    pub percent_daily_value: Option<i32>,
}

/// Helper for reading `last_insert_rowid()` on the connection that inserted.
#[derive(QueryableByName)]
pub struct LastInsertRowId {
    #[diesel(sql_type = BigInt, column_name = "last_insert_rowid()")]
    pub id: i64,
}
