//! Shared helper functions for CLI commands.

use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::repository::{run_migrations, AsyncSqlitePool};

/// Open the catalog database, creating directories and applying migrations.
pub async fn open_catalog(settings: &Settings) -> anyhow::Result<AsyncSqlitePool> {
    settings.ensure_directories()?;
    let pool = settings.pool();
    let applied = run_migrations(&pool)
        .await
        .with_context(|| format!("Failed to migrate {}", settings.database_url()))?;
    for name in applied {
        tracing::info!("Applied migration {}", name);
    }
    Ok(pool)
}

/// Spinner for long-running commands; hidden when output is machine-readable.
pub fn spinner(message: &str, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Truncate string to max length with ellipsis.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Colored "days left" cell: red when the catalog has run out.
pub fn format_days_left(days_left: Option<i64>) -> String {
    match days_left {
        None => style("-").dim().to_string(),
        Some(n) if n <= 0 => style(n).red().to_string(),
        Some(n) if n <= 3 => style(n).yellow().to_string(),
        Some(n) => style(n).green().to_string(),
    }
}
