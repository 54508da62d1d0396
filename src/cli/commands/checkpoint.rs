//! Checkpoint inspection commands.

use std::io::{self, Write};

use anyhow::Context;
use console::style;

use crate::cli::helpers::truncate;
use crate::config::Settings;
use crate::scrapers::CheckpointStore;

fn load(settings: &Settings) -> anyhow::Result<CheckpointStore> {
    CheckpointStore::load(&settings.checkpoint_path)
        .with_context(|| format!("Failed to load {}", settings.checkpoint_path.display()))
}

/// Summarize the checkpoint, or list one venue's days.
pub fn cmd_checkpoint_show(settings: &Settings, venue: Option<&str>) -> anyhow::Result<()> {
    let checkpoint = load(settings)?;

    if let Some(name) = venue {
        let days = checkpoint.days(name);
        if days.is_empty() {
            println!("{} No checkpointed days for '{}'", style("!").yellow(), name);
            return Ok(());
        }
        println!("\n{}", style(name).bold());
        println!("{}", "-".repeat(50));
        for day in days {
            let meals: Vec<&str> = day.meals.iter().map(|m| m.name.as_str()).collect();
            println!(
                "{}  {:>4} items  {}",
                day.date.format("%Y-%m-%d"),
                day.item_count(),
                meals.join(", ")
            );
        }
        return Ok(());
    }

    let names: Vec<&str> = checkpoint.venue_names().collect();
    if names.is_empty() {
        println!(
            "{} No checkpoint at {}",
            style("!").yellow(),
            settings.checkpoint_path.display()
        );
        return Ok(());
    }

    println!("\n{}", style("Checkpoint").bold());
    println!("  {}", style(settings.checkpoint_path.display()).dim());
    println!("{}", "-".repeat(60));
    println!("{:<25} {:>6} {:>12} {:>12}", "Venue", "Days", "First", "Last");
    println!("{}", "-".repeat(60));
    for name in names {
        let days = checkpoint.days(name);
        let first = days.first().map(|d| d.date.format("%Y-%m-%d").to_string());
        let last = days.last().map(|d| d.date.format("%Y-%m-%d").to_string());
        println!(
            "{:<25} {:>6} {:>12} {:>12}",
            truncate(name, 25),
            days.len(),
            first.unwrap_or_default(),
            last.unwrap_or_default()
        );
    }

    Ok(())
}

/// Forget checkpointed days so the next run re-scrapes them.
pub fn cmd_checkpoint_clear(
    settings: &Settings,
    venue: Option<&str>,
    confirm: bool,
) -> anyhow::Result<()> {
    let mut checkpoint = load(settings)?;
    let target = venue.unwrap_or("all venues");

    if !confirm {
        print!(
            "{} Clear checkpointed days for {}? [y/N] ",
            style("?").cyan(),
            target
        );
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Cancelled");
            return Ok(());
        }
    }

    let removed = checkpoint.clear(venue)?;
    println!(
        "{} Removed {} day(s) for {}",
        style("✓").green(),
        removed,
        target
    );
    Ok(())
}
