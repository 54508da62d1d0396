//! Scrape run orchestration.
//!
//! Walks each configured venue with a fresh session per attempt, restarts
//! on retryable UI failures according to the [`RetryPolicy`], then splits
//! combined venues in the checkpoint and ingests the new days. Emits
//! [`ScrapeEvent`]s for progress display.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, info_span, warn, Instrument};

use super::ingest::{IngestError, IngestService};
use crate::config::RetryPolicy;
use crate::models::{FoundCounts, RunStats, VenueStats};
use crate::repository::DieselError;
use crate::scrapers::{
    CancellationFlag, CheckpointError, CheckpointStore, Navigator, ResumePoint, ScrapeError,
    SessionFactory, TraversalOptions, VenueTraversal,
};

/// Errors that end a run without stats.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("database error: {0}")]
    Database(#[from] DieselError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// Events emitted during a scrape run.
#[derive(Debug, Clone)]
pub enum ScrapeEvent {
    /// A venue attempt is starting.
    VenueStarted { venue_id: u32, attempt: u32 },
    /// The venue caption was read and canonicalized.
    VenueIdentified { venue_id: u32, name: String },
    /// A retryable failure; the venue restarts after `delay`.
    Restarting {
        venue_id: u32,
        attempt: u32,
        error: String,
        delay: Duration,
    },
    /// Walk finished for a venue.
    VenueScraped { name: String, days: u64 },
    /// Venue could not be completed.
    VenueFailed { venue_id: u32, error: String },
    /// Checkpointed days written for one catalog venue.
    VenueIngested {
        name: String,
        meals_inserted: u64,
        items_inserted: u64,
    },
    /// Run stopped early (cancellation or fatal error).
    Aborted { reason: String },
}

/// Options for a scrape run.
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub venue_ids: Vec<u32>,
    pub traversal: TraversalOptions,
    pub retry: RetryPolicy,
    /// Ingest the new days after each venue.
    pub ingest: bool,
}

/// Venue caption resolved against the override tables.
#[derive(Debug, Clone)]
struct VenueIdentity {
    /// Checkpoint key: canonical caption, possibly a combined name.
    key: String,
    /// Constituent catalog venue names.
    parts: Vec<String>,
    /// More than one catalog venue shares this menu.
    combined: bool,
}

/// Runs the scrape pipeline over a set of venues.
pub struct ScrapeService {
    sessions: Arc<dyn SessionFactory>,
    ingest: IngestService,
    options: ScrapeOptions,
}

impl ScrapeService {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        ingest: IngestService,
        options: ScrapeOptions,
    ) -> Self {
        Self {
            sessions,
            ingest,
            options,
        }
    }

    /// Scrape every configured venue in order.
    ///
    /// Retry exhaustion marks the venue failed and moves on. Fatal scrape
    /// errors and cancellation stop the run with `aborted` set. Database and
    /// checkpoint failures outside the walk are returned as errors.
    pub async fn run(
        &self,
        checkpoint: &mut CheckpointStore,
        cancel: CancellationFlag,
        event_tx: mpsc::Sender<ScrapeEvent>,
    ) -> Result<RunStats, RunError> {
        let mut stats = RunStats::start();
        let today = Local::now().date_naive();

        for &venue_id in &self.options.venue_ids {
            if cancel.is_cancelled() {
                info!("Run cancelled before venue {}", venue_id);
                stats.aborted = true;
                let _ = event_tx
                    .send(ScrapeEvent::Aborted {
                        reason: "cancelled".to_string(),
                    })
                    .await;
                break;
            }

            let span = info_span!("venue", id = venue_id);
            let fatal = self
                .run_venue(venue_id, checkpoint, &cancel, &event_tx, today, &mut stats)
                .instrument(span)
                .await?;

            if let Some(reason) = fatal {
                stats.aborted = true;
                let _ = event_tx.send(ScrapeEvent::Aborted { reason }).await;
                break;
            }
        }

        stats.finish();
        info!(
            "Run finished: {} venue(s), {} restart(s), {} failed",
            stats.venues.len(),
            stats.total_restarts(),
            stats.failed_venues().len()
        );
        Ok(stats)
    }

    /// Scrape and ingest one venue. Returns the reason when the run must stop.
    async fn run_venue(
        &self,
        venue_id: u32,
        checkpoint: &mut CheckpointStore,
        cancel: &CancellationFlag,
        event_tx: &mpsc::Sender<ScrapeEvent>,
        today: NaiveDate,
        stats: &mut RunStats,
    ) -> Result<Option<String>, RunError> {
        let mut identity: Option<VenueIdentity> = None;
        let mut start_day: Option<NaiveDate> = None;
        let mut restarts = 0u32;
        let mut attempt = 0u32;

        let result = loop {
            attempt += 1;
            let _ = event_tx
                .send(ScrapeEvent::VenueStarted { venue_id, attempt })
                .await;

            let outcome = self
                .attempt(venue_id, checkpoint, cancel, &mut identity, &mut start_day, event_tx)
                .await;
            match outcome {
                Ok(()) => break Ok(()),
                Err(AttemptError::Database(e)) => return Err(RunError::Database(e)),
                Err(AttemptError::Scrape(e))
                    if e.is_retryable() && attempt < self.options.retry.max_attempts =>
                {
                    restarts += 1;
                    let delay = self.options.retry.backoff(restarts);
                    warn!(
                        "Attempt {} failed ({}), restarting in {:?}",
                        attempt, e, delay
                    );
                    let _ = event_tx
                        .send(ScrapeEvent::Restarting {
                            venue_id,
                            attempt,
                            error: e.to_string(),
                            delay,
                        })
                        .await;
                    tokio::time::sleep(delay).await;
                }
                Err(AttemptError::Scrape(e)) => break Err(e),
            }
        };

        let mut fatal = None;
        let error = match result {
            Ok(()) => None,
            Err(e) => {
                warn!("Venue {} failed after {} attempt(s): {}", venue_id, attempt, e);
                let _ = event_tx
                    .send(ScrapeEvent::VenueFailed {
                        venue_id,
                        error: e.to_string(),
                    })
                    .await;
                if !e.is_retryable() {
                    fatal = Some(e.to_string());
                }
                Some(e.to_string())
            }
        };

        let Some(identity) = identity else {
            let venue_stats = VenueStats {
                restarts,
                error,
                ..Default::default()
            };
            stats.venues.insert(format!("venue {venue_id}"), venue_stats);
            return Ok(fatal);
        };

        let found = found_since(checkpoint, &identity.key, start_day);
        let _ = event_tx
            .send(ScrapeEvent::VenueScraped {
                name: identity.key.clone(),
                days: found.days,
            })
            .await;
        if identity.combined {
            checkpoint.split_venue(&identity.key, &identity.parts)?;
        }

        for part in &identity.parts {
            let mut venue_stats = VenueStats {
                found,
                days_scraped: found.days,
                restarts,
                error: error.clone(),
                ..Default::default()
            };

            if self.options.ingest {
                match self.ingest.ingest_venue(part, checkpoint.days(part)).await {
                    Ok(report) => {
                        venue_stats.inserted.meals = report.totals.meals_inserted;
                        venue_stats.inserted.items = report.totals.items_inserted;
                        venue_stats.tree_nut_upgrades = report.totals.tree_nut_upgrades;
                        venue_stats.set_end_day(report.last_date, today);
                        let _ = event_tx
                            .send(ScrapeEvent::VenueIngested {
                                name: part.clone(),
                                meals_inserted: report.totals.meals_inserted,
                                items_inserted: report.totals.items_inserted,
                            })
                            .await;
                    }
                    Err(IngestError::UnknownVenue(name)) => {
                        warn!("'{}' is not in the catalog; run `venues sync`", name);
                        venue_stats.error.get_or_insert(format!("unknown venue '{name}'"));
                        venue_stats.set_end_day(checkpoint.last_day(part), today);
                    }
                    Err(e) => return Err(e.into()),
                }
            } else {
                venue_stats.set_end_day(checkpoint.last_day(part), today);
            }

            stats.venues.insert(part.clone(), venue_stats);
        }

        Ok(fatal)
    }

    /// One session: identify the venue, compute the resume point, walk.
    async fn attempt(
        &self,
        venue_id: u32,
        checkpoint: &mut CheckpointStore,
        cancel: &CancellationFlag,
        identity: &mut Option<VenueIdentity>,
        start_day: &mut Option<NaiveDate>,
        event_tx: &mpsc::Sender<ScrapeEvent>,
    ) -> Result<(), AttemptError> {
        let mut nav = self.sessions.open(venue_id).await?;
        let result = self
            .walk(nav.as_mut(), venue_id, checkpoint, cancel, identity, start_day, event_tx)
            .await;
        nav.close().await;
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn walk(
        &self,
        nav: &mut dyn Navigator,
        venue_id: u32,
        checkpoint: &mut CheckpointStore,
        cancel: &CancellationFlag,
        identity: &mut Option<VenueIdentity>,
        start_day: &mut Option<NaiveDate>,
        event_tx: &mpsc::Sender<ScrapeEvent>,
    ) -> Result<(), AttemptError> {
        let overrides = self.ingest.overrides();

        let label = nav.venue_label().await?;
        let key = overrides.venue(&label);
        let parts = overrides.split_venue(&label);
        let combined = overrides.is_combined_venue(&label);
        if identity.is_none() {
            info!("Venue {} is '{}'", venue_id, key);
            let _ = event_tx
                .send(ScrapeEvent::VenueIdentified {
                    venue_id,
                    name: key.clone(),
                })
                .await;
            *start_day = checkpoint.last_day(&key);
        }

        let resume = self.resume_point(checkpoint, &key, &parts).await?;
        info!("Resuming {} at {:?}", key, resume);
        *identity = Some(VenueIdentity {
            key: key.clone(),
            parts,
            combined,
        });

        let mut traversal = VenueTraversal::new(nav, self.options.traversal.clone())
            .with_cancellation(cancel.clone());
        let result = traversal.run(checkpoint, &key, resume).await;
        match result {
            Ok(outcome) => {
                info!(
                    "{}: scraped {} day(s), {} meal(s), {} item(s)",
                    key, outcome.days_scraped, outcome.meals, outcome.items
                );
                Ok(())
            }
            Err(e) => {
                warn!("{}: stopped while {}: {}", key, traversal.state(), e);
                Err(e.into())
            }
        }
    }

    /// Resume after the latest of the combined checkpoint key, the first
    /// constituent's checkpoint and the first constituent's catalog date.
    async fn resume_point(
        &self,
        checkpoint: &CheckpointStore,
        key: &str,
        parts: &[String],
    ) -> Result<ResumePoint, DieselError> {
        let first = parts.first().map(String::as_str).unwrap_or(key);

        let catalog_last = match self.ingest.venues().find_by_name(first).await? {
            Some(venue) => self.ingest.catalog().last_meal_date(&venue.id).await?,
            None => None,
        };
        let checkpoint_last = checkpoint.last_day(key).max(checkpoint.last_day(first));
        Ok(ResumePoint::after(catalog_last, checkpoint_last))
    }
}

/// Failure of one attempt.
#[derive(Debug)]
enum AttemptError {
    Scrape(ScrapeError),
    Database(DieselError),
}

impl From<ScrapeError> for AttemptError {
    fn from(e: ScrapeError) -> Self {
        Self::Scrape(e)
    }
}

impl From<DieselError> for AttemptError {
    fn from(e: DieselError) -> Self {
        Self::Database(e)
    }
}

/// Days, meals and items checkpointed under `key` after `since`.
fn found_since(checkpoint: &CheckpointStore, key: &str, since: Option<NaiveDate>) -> FoundCounts {
    checkpoint
        .days(key)
        .iter()
        .filter(|d| since.map_or(true, |s| d.date > s))
        .fold(FoundCounts::default(), |mut acc, day| {
            acc.days += 1;
            acc.meals += day.meals.len() as u64;
            acc.items += day.item_count() as u64;
            acc
        })
}
