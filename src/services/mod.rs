//! Service layer for menuscrape business logic.
//!
//! This module contains domain logic separated from UI concerns.
//! Services emit events for progress display and return plain results.

pub mod ingest;
pub mod scrape;

pub use ingest::{prepare_day, IngestError, IngestReport, IngestService};
pub use scrape::{RunError, ScrapeEvent, ScrapeOptions, ScrapeService};
