//! Chrome sessions driven over CDP with chromiumoxide.
//!
//! A [`BrowserSession`] either launches a local Chrome or attaches to a
//! remote DevTools endpoint. Sessions are created per venue attempt and
//! torn down with [`BrowserSession::close`].

mod config;
#[cfg(feature = "browser")]
mod navigator;

pub use config::BrowserEngineConfig;
#[cfg(feature = "browser")]
pub use navigator::ChromiumNavigator;

#[cfg(feature = "browser")]
use std::time::Duration;

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;

use super::error::ScrapeError;
use super::navigator::Navigator;
use super::SessionFactory;

/// Default menu application URL; `{id}` is replaced by the venue id.
pub const DEFAULT_MENU_URL: &str = "https://usa.jamix.cloud/menu/app?anro=97939&k={id}";

/// Expand a menu URL template for one venue.
pub fn menu_url(template: &str, venue_id: u32) -> String {
    template.replace("{id}", &venue_id.to_string())
}

/// One browser connection.
#[cfg(feature = "browser")]
pub struct BrowserSession {
    browser: Browser,
    handler: tokio::task::JoinHandle<()>,
    remote: bool,
}

#[cfg(feature = "browser")]
impl BrowserSession {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    /// Find a Chrome executable on disk or in `PATH`.
    fn find_chrome() -> Result<std::path::PathBuf, ScrapeError> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(ScrapeError::Browser(
            "Chrome/Chromium not found. Install it or set BROWSER_URL to a remote DevTools endpoint"
                .to_string(),
        ))
    }

    /// Launch a local browser or connect to the configured remote one.
    pub async fn start(config: &BrowserEngineConfig) -> Result<Self, ScrapeError> {
        if let Some(remote_url) = config.remote_url.as_deref() {
            return Self::connect_remote(config, remote_url).await;
        }

        info!("Launching browser (headless={})", config.headless);
        let chrome_path = Self::find_chrome()?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(Duration::from_secs(config.timeout));

        // with_head means NOT headless
        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--window-size=1280,1024");

        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScrapeError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to launch browser: {}", e)))?;

        Ok(Self {
            browser,
            handler: Self::spawn_handler(handler),
            remote: false,
        })
    }

    /// Connect to a remote Chrome instance.
    async fn connect_remote(config: &BrowserEngineConfig, url: &str) -> Result<Self, ScrapeError> {
        info!(
            "Connecting to remote browser at {} (timeout: {}s)",
            url, config.timeout
        );

        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let client = reqwest::Client::new();
        let resp: serde_json::Value = client
            .get(&version_url)
            .timeout(Duration::from_secs(config.timeout))
            .send()
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to connect to remote browser: {}", e)))?
            .json()
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to parse browser version info: {}", e)))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ScrapeError::Browser("No webSocketDebuggerUrl in response".to_string()))?;

        debug!("Connecting to WebSocket: {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(config.timeout),
            ..Default::default()
        };

        let (browser, handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to connect to remote browser: {}", e)))?;

        Ok(Self {
            browser,
            handler: Self::spawn_handler(handler),
            remote: true,
        })
    }

    fn spawn_handler(mut handler: chromiumoxide::Handler) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        })
    }

    /// Open a new tab at `url`.
    pub async fn open(&self, url: &str) -> Result<Page, ScrapeError> {
        info!("Navigating to {}", url);
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to open {}: {}", url, e)))?;
        if let Err(e) = page.wait_for_navigation().await {
            warn!("Navigation to {} did not settle: {}", url, e);
        }
        Ok(page)
    }

    /// Shut the session down. A launched browser is closed; a remote one is
    /// only detached from.
    pub async fn close(mut self) {
        if !self.remote {
            if let Err(e) = self.browser.close().await {
                debug!("Browser close failed: {}", e);
            }
            if let Err(e) = self.browser.wait().await {
                debug!("Browser wait failed: {}", e);
            }
        }
        self.handler.abort();
    }
}

/// Opens one [`ChromiumNavigator`] per venue attempt.
#[derive(Debug, Clone)]
pub struct ChromiumSessionFactory {
    config: BrowserEngineConfig,
    url_template: String,
    settle_delay: std::time::Duration,
}

impl ChromiumSessionFactory {
    pub fn new(
        config: BrowserEngineConfig,
        url_template: impl Into<String>,
        settle_delay: std::time::Duration,
    ) -> Self {
        Self {
            config,
            url_template: url_template.into(),
            settle_delay,
        }
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open(&self, venue_id: u32) -> Result<Box<dyn Navigator>, ScrapeError> {
        let session = BrowserSession::start(&self.config).await?;
        let url = menu_url(&self.url_template, venue_id);
        let page = match session.open(&url).await {
            Ok(page) => page,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };
        tokio::time::sleep(self.settle_delay).await;
        Ok(Box::new(ChromiumNavigator::new(
            session,
            page,
            self.settle_delay,
        )))
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open(&self, _venue_id: u32) -> Result<Box<dyn Navigator>, ScrapeError> {
        let _ = (&self.config, &self.url_template, self.settle_delay);
        Err(ScrapeError::Browser(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
                .to_string(),
        ))
    }
}
