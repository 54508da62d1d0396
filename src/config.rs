//! Configuration management for menuscrape using the prefer crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::overrides::OverrideConfig;
use crate::scrapers::{BrowserEngineConfig, TraversalOptions, DEFAULT_MENU_URL};

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "menuscrape.db";

/// Default checkpoint filename inside the data directory.
pub const DEFAULT_CHECKPOINT_FILENAME: &str = "menus.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {format} config {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },
}

/// Application settings: resolved runtime paths.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    pub database_url: Option<String>,
    /// Checkpoint JSON file.
    pub checkpoint_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        // Local data dir -> Home dir -> Current dir
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("menuscrape");
        Self::with_data_dir(data_dir)
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            checkpoint_path: data_dir.join(DEFAULT_CHECKPOINT_FILENAME),
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
        }
    }

    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        if let Some(ref url) = self.database_url {
            url.clone()
        } else {
            format!("sqlite:{}", self.database_path().display())
        }
    }

    /// Full path to the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        match self.database_url.as_deref().and_then(crate::repository::util::sqlite_path) {
            Some(path) => path,
            None => self.data_dir.join(&self.database_filename),
        }
    }

    /// Check if the database appears to be initialized.
    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Ensure the data directory (and the database's directory) exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("Cannot create data directory {}: {}", self.data_dir.display(), e),
            )
        })?;
        if let Some(parent) = self.database_path().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Connection factory for the configured database.
    pub fn pool(&self) -> crate::repository::AsyncSqlitePool {
        crate::repository::AsyncSqlitePool::new(&self.database_url())
    }
}

/// Traversal settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Menu URL template; `{id}` is replaced by the venue id.
    #[serde(default = "default_menu_url")]
    pub menu_url: String,
    /// Venue ids to walk, in order.
    #[serde(default = "default_venue_ids")]
    pub venue_ids: Vec<u32>,
    /// Wait after every UI action, in milliseconds.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Minimum meal tabs for a day to count.
    #[serde(default = "default_min_meals")]
    pub min_meals: usize,
    /// Upper bound on date steps while seeking.
    #[serde(default = "default_max_seek_steps")]
    pub max_seek_steps: usize,
}

fn default_menu_url() -> String {
    DEFAULT_MENU_URL.to_string()
}

fn default_venue_ids() -> Vec<u32> {
    (1..=11).collect()
}

fn default_settle_delay_ms() -> u64 {
    500
}

fn default_min_meals() -> usize {
    2
}

fn default_max_seek_steps() -> usize {
    400
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            menu_url: default_menu_url(),
            venue_ids: default_venue_ids(),
            settle_delay_ms: default_settle_delay_ms(),
            min_meals: default_min_meals(),
            max_seek_steps: default_max_seek_steps(),
        }
    }
}

impl ScrapeConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Apply environment overrides (`SETTLE_DELAY_MS`).
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(ms) = std::env::var("SETTLE_DELAY_MS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            self.settle_delay_ms = ms;
        }
        self
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn traversal_options(&self) -> TraversalOptions {
        TraversalOptions {
            settle_delay: self.settle_delay(),
            min_meals: self.min_meals,
            max_seek_steps: self.max_seek_steps,
        }
    }
}

/// Restart policy for venues that hit retryable UI errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per venue, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first restart, doubled per restart.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    /// Ceiling for the doubled delay.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_backoff_secs() -> u64 {
    2
}

fn default_max_backoff_secs() -> u64 {
    60
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

impl RetryPolicy {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_secs: 0,
            max_backoff_secs: 0,
        }
    }

    /// Delay before restart number `restart` (1-based).
    pub fn backoff(&self, restart: u32) -> Duration {
        let factor = 1u64 << restart.saturating_sub(1).min(16);
        let secs = self
            .backoff_secs
            .saturating_mul(factor)
            .min(self.max_backoff_secs);
        Duration::from_secs(secs)
    }
}

/// Catalog venue row to seed with `venues sync`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueSeed {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

impl VenueSeed {
    fn new(id: &str, name: &str, nickname: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            nickname: nickname.map(str::to_string),
        }
    }

    pub fn to_venue(&self) -> crate::models::Venue {
        crate::models::Venue::new(
            self.id.clone(),
            self.name.clone(),
            self.nickname.clone().unwrap_or_else(|| self.name.clone()),
        )
    }
}

/// The residential dining halls.
pub fn default_venues() -> Vec<VenueSeed> {
    vec![
        VenueSeed::new("BK", "Berkeley", None),
        VenueSeed::new("BR", "Branford", None),
        VenueSeed::new("DC", "Davenport", None),
        VenueSeed::new("BF", "Benjamin Franklin", Some("Franklin")),
        VenueSeed::new("GH", "Grace Hopper", Some("Hopper")),
        VenueSeed::new("JE", "Jonathan Edwards", Some("JE")),
        VenueSeed::new("MC", "Morse", None),
        VenueSeed::new("MY", "Pauli Murray", Some("Murray")),
        VenueSeed::new("PC", "Pierson", None),
        VenueSeed::new("SY", "Saybrook", None),
        VenueSeed::new("SM", "Silliman", None),
        VenueSeed::new("ES", "Ezra Stiles", Some("Stiles")),
        VenueSeed::new("TD", "Timothy Dwight", Some("TD")),
        VenueSeed::new("TC", "Trumbull", None),
    ]
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Checkpoint file path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<String>,
    #[serde(default, skip_serializing_if = "ScrapeConfig::is_default")]
    pub scrape: ScrapeConfig,
    #[serde(default, skip_serializing_if = "RetryPolicy::is_default")]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    /// Extra name overrides layered over the built-in tables.
    #[serde(default, skip_serializing_if = "OverrideConfig::is_default")]
    pub overrides: OverrideConfig,
    /// Venue seed list; empty means the built-in list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub venues: Vec<VenueSeed>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers menuscrape config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("menuscrape").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config: {}", e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            // No config file found
            Err(_) => Self::default_with_env(),
        }
    }

    /// Default config with environment variable overrides applied.
    pub fn default_with_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        self.scrape = self.scrape.with_env_overrides();
        self.browser = self.browser.with_env_overrides();
        self
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |format: &'static str, message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            format,
            message,
        };

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).map_err(|e| parse_err("TOML", e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| parse_err("YAML", e.to_string()))?
            }
            _ => serde_json::from_str(&contents).map_err(|e| parse_err("JSON", e.to_string()))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with `~/` are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        if let Some(rest) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        let path = Path::new(path_str);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
            settings.checkpoint_path = settings.data_dir.join(DEFAULT_CHECKPOINT_FILENAME);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref checkpoint) = self.checkpoint {
            settings.checkpoint_path = self.resolve_path(checkpoint, base_dir);
        }
    }

    /// Venue seeds from config, or the built-in list.
    pub fn venue_seeds(&self) -> Vec<VenueSeed> {
        if self.venues.is_empty() {
            default_venues()
        } else {
            self.venues.clone()
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory (--data flag).
    pub data: Option<PathBuf>,
}

/// Load config from an explicit path or by discovery.
async fn load_file_config(options: &LoadOptions) -> Result<Config, ConfigError> {
    if let Some(ref config_path) = options.config_path {
        return Config::load_from_path(config_path).await;
    }
    Ok(Config::load().await)
}

/// Load settings with explicit options.
///
/// Precedence, lowest first: defaults, config file, `MENUSCRAPE_DATA_DIR`,
/// `--data`, `DATABASE_URL`.
pub async fn load_settings_with_options(
    options: LoadOptions,
) -> Result<(Settings, Config), ConfigError> {
    let config = load_file_config(&options).await?;
    let mut settings = Settings::default();

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = config.base_dir().unwrap_or_else(|| cwd.clone());
    config.apply_to_settings(&mut settings, &base_dir);

    let data_dir_override = options.data.clone().or_else(|| {
        std::env::var("MENUSCRAPE_DATA_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    });
    if let Some(data_dir) = data_dir_override {
        let data_dir = if data_dir.is_absolute() {
            data_dir
        } else {
            cwd.join(data_dir)
        };
        tracing::debug!("Using data dir override: {}", data_dir.display());
        settings.checkpoint_path = data_dir.join(DEFAULT_CHECKPOINT_FILENAME);
        settings.data_dir = data_dir;
    }

    // DATABASE_URL environment variable takes highest precedence
    if let Some(database_url) = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()) {
        tracing::debug!("Using DATABASE_URL from environment: {}", database_url);
        settings.database_url = Some(database_url);
    }

    Ok((settings, config))
}
