//! Acquisition side of the pipeline: browser sessions, page parsing,
//! the venue walk and its checkpoint.

pub mod browser;
pub mod checkpoint;
pub mod error;
pub mod navigator;
pub mod parser;
pub mod traversal;

use async_trait::async_trait;

pub use browser::{menu_url, BrowserEngineConfig, ChromiumSessionFactory, DEFAULT_MENU_URL};
#[cfg(feature = "browser")]
pub use browser::{BrowserSession, ChromiumNavigator};
pub use checkpoint::{CheckpointError, CheckpointStore, ResumePoint};
pub use error::{ErrorKind, ScrapeError};
pub use navigator::{Direction, Navigator};
pub use parser::{parse_ingredients_panel, parse_nutrition_panel};
pub use traversal::{
    CancellationFlag, TraversalOptions, TraversalOutcome, TraversalState, VenueTraversal,
};

/// Creates a fresh navigator positioned on a venue's menu view.
///
/// The orchestrator opens one session per venue attempt and closes it on
/// every exit path.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, venue_id: u32) -> Result<Box<dyn Navigator>, ScrapeError>;
}
