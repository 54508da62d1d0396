//! Venue management commands.

use std::collections::HashMap;

use console::style;

use crate::cli::helpers::{format_date, open_catalog, truncate};
use crate::config::{Config, Settings};
use crate::repository::{DieselCatalogRepository, DieselVenueRepository};

/// List catalog venues with their meal coverage.
pub async fn cmd_venues_list(settings: &Settings) -> anyhow::Result<()> {
    let pool = open_catalog(settings).await?;
    let venues = DieselVenueRepository::new(pool.clone()).get_all().await?;

    if venues.is_empty() {
        println!(
            "{} No venues. Run 'menuscrape venues sync' first.",
            style("!").yellow()
        );
        return Ok(());
    }

    let coverage: HashMap<String, _> = DieselCatalogRepository::new(pool)
        .coverage()
        .await?
        .into_iter()
        .map(|c| (c.venue_id.clone(), c))
        .collect();

    println!("\n{}", style("Venues").bold());
    println!("{}", "-".repeat(72));
    println!(
        "{:<5} {:<22} {:<12} {:<6} {:>7} {:>11}",
        "ID", "Name", "Nickname", "Open", "Meals", "Last day"
    );
    println!("{}", "-".repeat(72));

    for venue in venues {
        let cov = coverage.get(&venue.id);
        println!(
            "{:<5} {:<22} {:<12} {:<6} {:>7} {:>11}",
            venue.id,
            truncate(&venue.name, 22),
            truncate(&venue.nickname, 12),
            if venue.is_open { "yes" } else { "no" },
            cov.map_or(0, |c| c.meals),
            format_date(cov.and_then(|c| c.last_date)),
        );
    }

    Ok(())
}

/// Create missing venues and refresh names from the seed list.
///
/// Status columns (open flag, occupancy, contact details) are left alone.
pub async fn cmd_venues_sync(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    let pool = open_catalog(settings).await?;
    let repo = DieselVenueRepository::new(pool);

    let mut added = 0;
    let mut updated = 0;
    for seed in config.venue_seeds() {
        let seeded = seed.to_venue();
        match repo.get(&seed.id).await? {
            Some(mut existing) => {
                if existing.name != seeded.name || existing.nickname != seeded.nickname {
                    existing.name = seeded.name;
                    existing.nickname = seeded.nickname;
                    existing.updated_at = chrono::Utc::now();
                    repo.upsert(&existing).await?;
                    updated += 1;
                    println!("  {} Updated {}", style("↻").cyan(), existing.name);
                }
            }
            None => {
                repo.upsert(&seeded).await?;
                added += 1;
                println!("  {} Added {}", style("✓").green(), seeded.name);
            }
        }
    }

    println!(
        "{} {} added, {} updated, {} total",
        style("✓").green(),
        added,
        updated,
        repo.count().await?
    );
    Ok(())
}
