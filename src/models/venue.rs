//! Venue (dining hall) records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dining hall whose menu is scraped.
///
/// Rows are owned by the status refresh collaborator; ingestion only looks
/// them up by display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    /// Stable short code, e.g. `BK`.
    pub id: String,
    pub name: String,
    pub nickname: String,
    pub is_open: bool,
    pub occupancy: i32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Venue {
    /// Create a closed venue with no contact details.
    pub fn new(id: impl Into<String>, name: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nickname: nickname.into(),
            is_open: false,
            occupancy: 0,
            latitude: None,
            longitude: None,
            address: None,
            phone: None,
            updated_at: Utc::now(),
        }
    }
}
