//! Scrape run command.

use std::sync::Arc;

use anyhow::Context;
use console::style;
use tokio::sync::mpsc;

use crate::cli::helpers::{format_date, format_days_left, open_catalog, spinner};
use crate::config::{Config, Settings};
use crate::models::RunStats;
use crate::overrides::NameOverrides;
use crate::scrapers::{CancellationFlag, CheckpointStore, ChromiumSessionFactory};
use crate::services::{IngestService, ScrapeEvent, ScrapeOptions, ScrapeService};

/// Scrape the configured venues, checkpoint new days and ingest them.
pub async fn cmd_run(
    settings: &Settings,
    config: &Config,
    venue_ids: Vec<u32>,
    skip_ingest: bool,
    json: bool,
) -> anyhow::Result<()> {
    let pool = open_catalog(settings).await?;
    let mut checkpoint = CheckpointStore::load(&settings.checkpoint_path)
        .with_context(|| format!("Failed to load {}", settings.checkpoint_path.display()))?;

    let overrides = NameOverrides::with_config(&config.overrides);
    let ingest = IngestService::new(pool, overrides, config.scrape.min_meals);
    let sessions = Arc::new(ChromiumSessionFactory::new(
        config.browser.clone(),
        config.scrape.menu_url.clone(),
        config.scrape.settle_delay(),
    ));
    let options = ScrapeOptions {
        venue_ids: if venue_ids.is_empty() {
            config.scrape.venue_ids.clone()
        } else {
            venue_ids
        },
        traversal: config.scrape.traversal_options(),
        retry: config.retry.clone(),
        ingest: !skip_ingest,
    };
    let service = ScrapeService::new(sessions, ingest, options);

    // Ctrl-C stops the run at the next day or venue boundary
    let cancel = CancellationFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted; stopping after the current day");
                cancel.cancel();
            }
        });
    }

    let (event_tx, mut event_rx) = mpsc::channel::<ScrapeEvent>(100);
    let pb = spinner("Starting run", json);

    let progress = pb.clone();
    let event_handler = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                ScrapeEvent::VenueStarted { venue_id, attempt } => {
                    if attempt == 1 {
                        progress.set_message(format!("Venue {venue_id}: opening menu"));
                    } else {
                        progress.set_message(format!("Venue {venue_id}: attempt {attempt}"));
                    }
                }
                ScrapeEvent::VenueIdentified { venue_id, name } => {
                    progress.set_message(format!("Venue {venue_id}: scraping {name}"));
                }
                ScrapeEvent::Restarting {
                    venue_id,
                    attempt,
                    error,
                    delay,
                } => {
                    progress.println(format!(
                        "  {} venue {} attempt {} failed: {} (retry in {}s)",
                        style("↻").cyan(),
                        venue_id,
                        attempt,
                        error,
                        delay.as_secs()
                    ));
                }
                ScrapeEvent::VenueScraped { name, days } => {
                    progress.println(format!(
                        "  {} {} {} new day(s)",
                        style("✓").green(),
                        name,
                        days
                    ));
                }
                ScrapeEvent::VenueFailed { venue_id, error } => {
                    progress.println(format!(
                        "  {} venue {}: {}",
                        style("✗").red(),
                        venue_id,
                        error
                    ));
                }
                ScrapeEvent::VenueIngested {
                    name,
                    meals_inserted,
                    items_inserted,
                } => {
                    progress.println(format!(
                        "  {} {} +{} meals, +{} items",
                        style("→").dim(),
                        name,
                        meals_inserted,
                        items_inserted
                    ));
                }
                ScrapeEvent::Aborted { reason } => {
                    progress.println(format!("  {} Run aborted: {}", style("!").yellow(), reason));
                }
            }
        }
        progress.finish_and_clear();
    });

    let result = service.run(&mut checkpoint, cancel, event_tx).await;
    let _ = event_handler.await;
    let stats = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_run_stats(&stats, skip_ingest);
    }

    if stats.aborted {
        anyhow::bail!("run aborted before all venues were visited");
    }
    Ok(())
}

fn print_run_stats(stats: &RunStats, skip_ingest: bool) {
    println!("\n{}", style("Run Summary").bold());
    println!("{}", "-".repeat(78));
    println!(
        "{:<20} {:>5} {:>6} {:>6} {:>7} {:>7} {:>8} {:>11} {:>5}",
        "Venue", "Days", "Meals", "Items", "+Meals", "+Items", "Restarts", "Last day", "Left"
    );
    println!("{}", "-".repeat(78));

    for (name, venue) in &stats.venues {
        println!(
            "{:<20} {:>5} {:>6} {:>6} {:>7} {:>7} {:>8} {:>11} {:>5}",
            crate::cli::helpers::truncate(name, 20),
            venue.found.days,
            venue.found.meals,
            venue.found.items,
            venue.inserted.meals,
            venue.inserted.items,
            venue.restarts,
            format_date(venue.end_day),
            format_days_left(venue.days_left),
        );
        if let Some(ref error) = venue.error {
            println!("  {} {}", style("✗").red(), error);
        }
    }

    if skip_ingest {
        println!(
            "\n  {} Catalog not updated; run 'menuscrape ingest' to write the checkpoint",
            style("→").dim()
        );
    }
    if let Some(min) = stats.min_days_left() {
        println!(
            "\n{} Catalog runs out in {} day(s)",
            style("→").cyan(),
            format_days_left(Some(min))
        );
    }
}
