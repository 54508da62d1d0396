//! Per-venue cache of scraped days, persisted as one JSON file.
//!
//! The file maps a venue display name to its days in ascending date order.
//! Every append rewrites the whole file through a temp file in the same
//! directory followed by a rename, so a crash leaves either the old or the
//! new content on disk.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::Day;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed checkpoint {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("refusing to append {date} to {venue}: last stored day is {last}")]
    OutOfOrder {
        venue: String,
        date: NaiveDate,
        last: NaiveDate,
    },
}

/// Where traversal should start for a venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePoint {
    /// Seek to this date.
    Date(NaiveDate),
    /// Nothing known yet; seek back to the earliest available date.
    Earliest,
}

impl ResumePoint {
    /// Resume after the later of two optional known dates.
    pub fn after(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Self {
        match a.max(b).and_then(|d| d.succ_opt()) {
            Some(date) => Self::Date(date),
            None => Self::Earliest,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            Self::Earliest => None,
        }
    }
}

/// JSON-backed store of scraped days keyed by venue name.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    venues: BTreeMap<String, Vec<Day>>,
}

impl CheckpointStore {
    /// Load the store at `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let path = path.into();
        let venues = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| CheckpointError::Json {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No checkpoint at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(source) => return Err(CheckpointError::Io { path, source }),
        };
        Ok(Self { path, venues })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn venue_names(&self) -> impl Iterator<Item = &str> {
        self.venues.keys().map(String::as_str)
    }

    /// Stored days for `venue`, oldest first.
    pub fn days(&self, venue: &str) -> &[Day] {
        self.venues.get(venue).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn last_day(&self, venue: &str) -> Option<NaiveDate> {
        self.days(venue).last().map(|d| d.date)
    }

    /// Append a day and flush the whole store to disk.
    pub fn append_day(&mut self, venue: &str, day: Day) -> Result<(), CheckpointError> {
        if let Some(last) = self.last_day(venue) {
            if day.date <= last {
                return Err(CheckpointError::OutOfOrder {
                    venue: venue.to_string(),
                    date: day.date,
                    last,
                });
            }
        }
        debug!("Checkpointing {} for {}", day.date, venue);
        self.venues.entry(venue.to_string()).or_default().push(day);
        self.flush()
    }

    /// Resume point for `venue` given the last meal date already in the catalog.
    pub fn resume_date(&self, venue: &str, last_catalog_date: Option<NaiveDate>) -> ResumePoint {
        ResumePoint::after(last_catalog_date, self.last_day(venue))
    }

    /// Re-key a combined venue's days under each constituent name.
    ///
    /// Days already present for a constituent are kept; only newer days are
    /// copied. The combined key is removed afterwards.
    pub fn split_venue(&mut self, combined: &str, parts: &[String]) -> Result<(), CheckpointError> {
        if parts.len() == 1 && parts[0] == combined {
            return Ok(());
        }
        let Some(days) = self.venues.remove(combined) else {
            return Ok(());
        };
        for part in parts {
            let last = self.last_day(part);
            let target = self.venues.entry(part.clone()).or_default();
            target.extend(
                days.iter()
                    .filter(|d| last.map_or(true, |l| d.date > l))
                    .cloned(),
            );
        }
        info!(
            "Split {} checkpoint days from '{}' into {:?}",
            days.len(),
            combined,
            parts
        );
        self.flush()
    }

    /// Forget `venue` (or everything when `None`). Returns the number of days removed.
    pub fn clear(&mut self, venue: Option<&str>) -> Result<usize, CheckpointError> {
        let removed = match venue {
            Some(name) => self.venues.remove(name).map_or(0, |d| d.len()),
            None => {
                let n = self.venues.values().map(Vec::len).sum();
                self.venues.clear();
                n
            }
        };
        self.flush()?;
        Ok(removed)
    }

    fn flush(&self) -> Result<(), CheckpointError> {
        let io_err = |source| CheckpointError::Io {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let json = serde_json::to_vec_pretty(&self.venues).map_err(|source| {
            CheckpointError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Meal;
    use tempfile::tempdir;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn day(d: u32) -> Day {
        let mut day = Day::new(date(d));
        for name in ["Breakfast", "Dinner"] {
            day.meals.push(Meal {
                name: name.into(),
                courses: vec![],
            });
        }
        day
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::load(dir.path().join("menus.json")).unwrap();
        assert!(store.days("Berkeley").is_empty());
        assert_eq!(store.resume_date("Berkeley", None), ResumePoint::Earliest);
    }

    #[test]
    fn test_append_flushes_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("menus.json");
        let mut store = CheckpointStore::load(&path).unwrap();
        store.append_day("Berkeley", day(19)).unwrap();
        store.append_day("Berkeley", day(20)).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"20/10/2026\""));

        let reloaded = CheckpointStore::load(&path).unwrap();
        assert_eq!(reloaded.days("Berkeley").len(), 2);
        assert_eq!(reloaded.last_day("Berkeley"), Some(date(20)));
    }

    #[test]
    fn test_resume_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut store = CheckpointStore::load(dir.path().join("menus.json")).unwrap();
        store.append_day("Morse", day(19)).unwrap();

        assert_eq!(store.resume_date("Morse", None), ResumePoint::Date(date(20)));
        // the catalog may be ahead of the checkpoint
        assert_eq!(
            store.resume_date("Morse", Some(date(22))),
            ResumePoint::Date(date(23))
        );

        let err = store.append_day("Morse", day(19)).unwrap_err();
        assert!(matches!(err, CheckpointError::OutOfOrder { .. }));
        assert_eq!(store.days("Morse").len(), 1);
    }

    #[test]
    fn test_split_combined_venue() {
        let dir = tempdir().unwrap();
        let mut store = CheckpointStore::load(dir.path().join("menus.json")).unwrap();
        store.append_day("Morse", day(18)).unwrap();
        store.append_day("Ezra Stiles/Morse", day(18)).unwrap();
        store.append_day("Ezra Stiles/Morse", day(19)).unwrap();

        let parts = vec!["Ezra Stiles".to_string(), "Morse".to_string()];
        store.split_venue("Ezra Stiles/Morse", &parts).unwrap();

        assert!(store.days("Ezra Stiles/Morse").is_empty());
        assert_eq!(store.days("Ezra Stiles").len(), 2);
        assert_eq!(store.days("Morse").len(), 2);
        assert_eq!(store.last_day("Morse"), Some(date(19)));
    }

    #[test]
    fn test_clear_one_venue() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("menus.json");
        let mut store = CheckpointStore::load(&path).unwrap();
        store.append_day("Berkeley", day(19)).unwrap();
        store.append_day("Trumbull", day(19)).unwrap();

        assert_eq!(store.clear(Some("Berkeley")).unwrap(), 1);
        let reloaded = CheckpointStore::load(&path).unwrap();
        assert_eq!(reloaded.venue_names().collect::<Vec<_>>(), vec!["Trumbull"]);
    }
}
