//! Initialize command.

use console::style;

use crate::cli::helpers::open_catalog;
use crate::config::{Config, Settings};
use crate::repository::DieselVenueRepository;

/// Initialize the data directory, database and venue rows.
pub async fn cmd_init(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    let pool = open_catalog(settings).await?;
    let venue_repo = DieselVenueRepository::new(pool);

    let mut venues_added = 0;
    for seed in config.venue_seeds() {
        if venue_repo.get(&seed.id).await?.is_none() {
            venue_repo.upsert(&seed.to_venue()).await?;
            venues_added += 1;
            println!("  {} Added venue: {}", style("✓").green(), seed.name);
        }
    }

    if venues_added == 0 {
        println!(
            "  {} {} venues already present",
            style("→").dim(),
            venue_repo.count().await?
        );
    }

    println!(
        "{} Initialized menuscrape in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    println!(
        "  {} Checkpoint: {}",
        style("→").dim(),
        settings.checkpoint_path.display()
    );

    Ok(())
}
