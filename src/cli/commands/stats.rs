//! Catalog coverage and freshness.

use chrono::{Local, NaiveDate};
use console::style;
use serde::Serialize;

use crate::cli::helpers::{format_date, format_days_left, open_catalog, truncate};
use crate::config::Settings;
use crate::repository::{DieselCatalogRepository, DieselVenueRepository};

#[derive(Debug, Serialize)]
struct VenueFreshness {
    id: String,
    name: String,
    meals: i64,
    last_date: Option<NaiveDate>,
    days_left: Option<i64>,
}

#[derive(Debug, Serialize)]
struct CatalogStats {
    today: NaiveDate,
    items: i64,
    venues: Vec<VenueFreshness>,
}

pub async fn cmd_stats(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let pool = open_catalog(settings).await?;
    let catalog = DieselCatalogRepository::new(pool.clone());
    let venues = DieselVenueRepository::new(pool).get_all().await?;
    let coverage = catalog.coverage().await?;
    let today = Local::now().date_naive();

    let rows: Vec<VenueFreshness> = venues
        .into_iter()
        .map(|venue| {
            let cov = coverage.iter().find(|c| c.venue_id == venue.id);
            let last_date = cov.and_then(|c| c.last_date);
            VenueFreshness {
                meals: cov.map_or(0, |c| c.meals),
                days_left: last_date.map(|d| (d - today).num_days() + 1),
                last_date,
                id: venue.id,
                name: venue.name,
            }
        })
        .collect();

    let stats = CatalogStats {
        today,
        items: catalog.item_count().await?,
        venues: rows,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("\n{}", style("Catalog").bold());
    println!("{}", "-".repeat(56));
    println!(
        "{:<5} {:<22} {:>7} {:>11} {:>6}",
        "ID", "Name", "Meals", "Last day", "Left"
    );
    println!("{}", "-".repeat(56));
    for row in &stats.venues {
        println!(
            "{:<5} {:<22} {:>7} {:>11} {:>6}",
            row.id,
            truncate(&row.name, 22),
            row.meals,
            format_date(row.last_date),
            format_days_left(row.days_left),
        );
    }
    println!("\n{} {} distinct items", style("→").cyan(), stats.items);

    Ok(())
}
