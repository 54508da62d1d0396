//! menuscrape - dining hall menu acquisition and catalog ingestion.
//!
//! Walks a browser-rendered, date-paginated menu application venue by venue,
//! checkpoints every parsed day, and ingests the days into a SQLite catalog
//! with deduplicated items and label-rounded nutrition facts.

pub mod cli;
pub mod config;
pub mod migrations;
pub mod models;
pub mod normalize;
pub mod overrides;
pub mod repository;
pub mod schema;
pub mod scrapers;
pub mod services;
