//! Repository layer for catalog persistence.
//!
//! All database access uses Diesel with diesel-async over SQLite.

pub mod diesel_catalog;
pub mod diesel_models;
pub mod diesel_pool;
pub mod diesel_venue;
pub mod migrations;
pub mod util;

pub use diesel_catalog::{
    DayBatch, DayReport, DieselCatalogRepository, ItemBatch, MealBatch, VenueCoverage,
};
pub use diesel_pool::{AsyncSqliteConnection, AsyncSqlitePool, DieselError};
pub use diesel_venue::DieselVenueRepository;
pub use migrations::{applied_migrations, run_migrations};
