//! Ingest command: write the whole checkpoint into the catalog.

use anyhow::Context;
use console::style;

use crate::cli::helpers::{format_date, open_catalog, spinner, truncate};
use crate::config::{Config, Settings};
use crate::overrides::NameOverrides;
use crate::scrapers::CheckpointStore;
use crate::services::IngestService;

pub async fn cmd_ingest(settings: &Settings, config: &Config, json: bool) -> anyhow::Result<()> {
    let pool = open_catalog(settings).await?;
    let checkpoint = CheckpointStore::load(&settings.checkpoint_path)
        .with_context(|| format!("Failed to load {}", settings.checkpoint_path.display()))?;

    if checkpoint.venue_names().next().is_none() {
        println!(
            "{} Checkpoint {} is empty; run 'menuscrape run' first",
            style("!").yellow(),
            settings.checkpoint_path.display()
        );
        return Ok(());
    }

    let service = IngestService::new(
        pool,
        NameOverrides::with_config(&config.overrides),
        config.scrape.min_meals,
    );

    let pb = spinner("Ingesting checkpoint", json);
    let reports = service.ingest_checkpoint(&checkpoint).await?;
    pb.finish_and_clear();

    if json {
        let summary: serde_json::Map<String, serde_json::Value> = reports
            .iter()
            .map(|(name, r)| {
                (
                    name.clone(),
                    serde_json::json!({
                        "venue_id": r.venue_id,
                        "days": r.days,
                        "unusable_days": r.unusable_days,
                        "stale_days": r.stale_days,
                        "meals_inserted": r.totals.meals_inserted,
                        "meals_skipped": r.totals.meals_skipped,
                        "items_inserted": r.totals.items_inserted,
                        "items_reused": r.totals.items_reused,
                        "tree_nut_upgrades": r.totals.tree_nut_upgrades,
                        "last_date": r.last_date,
                    }),
                )
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("\n{}", style("Ingestion").bold());
    println!("{}", "-".repeat(70));
    println!(
        "{:<22} {:>5} {:>7} {:>7} {:>7} {:>7} {:>11}",
        "Venue", "Days", "+Meals", "Skipped", "+Items", "Reused", "Last day"
    );
    println!("{}", "-".repeat(70));
    for (name, report) in &reports {
        println!(
            "{:<22} {:>5} {:>7} {:>7} {:>7} {:>7} {:>11}",
            truncate(name, 22),
            report.days,
            report.totals.meals_inserted,
            report.totals.meals_skipped,
            report.totals.items_inserted,
            report.totals.items_reused,
            format_date(report.last_date),
        );
    }

    let upgrades: u64 = reports.values().map(|r| r.totals.tree_nut_upgrades).sum();
    if upgrades > 0 {
        println!(
            "\n  {} {} existing item(s) gained the tree nut flag",
            style("→").dim(),
            upgrades
        );
    }
    println!("{} Ingested {} venue(s)", style("✓").green(), reports.len());

    Ok(())
}
