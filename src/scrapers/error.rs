//! Scrape error taxonomy.

use thiserror::Error;

use super::checkpoint::CheckpointError;
use super::navigator::Direction;

/// Whether an error is worth restarting the venue traversal for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transient UI condition; restart the venue from its last checkpoint.
    Retryable,
    /// Abort the venue (and usually the run).
    Fatal,
}

/// Errors raised while driving the menu application.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("stale element: {0}")]
    StaleElement(String),

    #[error("click intercepted: {0}")]
    ClickIntercepted(String),

    #[error("element not interactable: {0}")]
    NotInteractable(String),

    /// An element vanished between listing and use, or a re-listed index is gone.
    #[error("element missing: {0}")]
    ElementMissing(String),

    #[error("no {0} date control on page")]
    NavigationUnavailable(Direction),

    #[error("unreadable date label '{0}'")]
    UnparseableDate(String),

    #[error("gave up seeking after {steps} date steps")]
    SeekExhausted { steps: usize },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("traversal cancelled")]
    Cancelled,
}

impl ScrapeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StaleElement(_)
            | Self::ClickIntercepted(_)
            | Self::NotInteractable(_)
            | Self::ElementMissing(_)
            | Self::NavigationUnavailable(_)
            | Self::UnparseableDate(_) => ErrorKind::Retryable,
            Self::SeekExhausted { .. }
            | Self::Browser(_)
            | Self::Checkpoint(_)
            | Self::Cancelled => ErrorKind::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }

    /// Classify a raw driver error message into the taxonomy.
    pub fn from_driver_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("detached")
            || lower.contains("stale")
            || lower.contains("could not find node")
            || lower.contains("no node with given id")
        {
            Self::StaleElement(message)
        } else if lower.contains("intercept") || lower.contains("other element would receive") {
            Self::ClickIntercepted(message)
        } else if lower.contains("not interactable")
            || lower.contains("layout object")
            || lower.contains("box model")
            || lower.contains("not visible")
        {
            Self::NotInteractable(message)
        } else if lower.contains("not found") || lower.contains("no element") {
            Self::ElementMissing(message)
        } else {
            Self::Browser(message)
        }
    }
}
