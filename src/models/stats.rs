//! Run statistics handed to the reporting collaborator.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Counts of records seen on the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundCounts {
    pub days: u64,
    pub meals: u64,
    pub items: u64,
}

/// Counts of rows newly written to the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertedCounts {
    pub meals: u64,
    pub items: u64,
}

/// Per-venue outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenueStats {
    pub found: FoundCounts,
    pub inserted: InsertedCounts,
    /// Existing items whose tree-nut flag was upgraded in place.
    pub tree_nut_upgrades: u64,
    /// Full traversal restarts caused by transient UI failures.
    pub restarts: u32,
    /// Days appended to the checkpoint during this run.
    pub days_scraped: u64,
    /// Last date with a persisted meal for this venue.
    pub end_day: Option<NaiveDate>,
    /// Days before the catalog runs out, counting today.
    pub days_left: Option<i64>,
    /// Set when the venue could not be completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VenueStats {
    /// Compute catalog freshness relative to `today`.
    pub fn set_end_day(&mut self, end_day: Option<NaiveDate>, today: NaiveDate) {
        self.end_day = end_day;
        self.days_left = end_day.map(|end| (end - today).num_days() + 1);
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate statistics for one scrape run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub venues: BTreeMap<String, VenueStats>,
    /// True when the run stopped before visiting every venue.
    #[serde(default)]
    pub aborted: bool,
}

impl RunStats {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            venues: BTreeMap::new(),
            aborted: false,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn total_restarts(&self) -> u32 {
        self.venues.values().map(|v| v.restarts).sum()
    }

    pub fn failed_venues(&self) -> Vec<&str> {
        self.venues
            .iter()
            .filter(|(_, v)| v.is_failed())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Smallest `days_left` across venues, i.e. the venue closest to running dry.
    pub fn min_days_left(&self) -> Option<i64> {
        self.venues.values().filter_map(|v| v.days_left).min()
    }
}
