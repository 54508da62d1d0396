//! UI primitives for one venue's menu view.
//!
//! The menu application re-renders panels lazily after every click, so any
//! element obtained before a click is invalid after it. Navigators therefore
//! only hand out labels: listing operations return an ordered `Vec<String>`
//! and selection takes an index into a list that the caller fetched *after*
//! its most recent mutating call. Callers must re-list after every click.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use super::error::ScrapeError;

/// Date pagination direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Previous => f.write_str("previous"),
            Self::Next => f.write_str("next"),
        }
    }
}

/// Wait for the UI to settle after a mutating action.
pub async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Primitive UI actions against a venue's menu view.
///
/// Every state-changing method returns only after the page has settled.
/// Labels returned by `list_*` methods are single-use: they describe the
/// page as it was when listed and must be re-fetched after any other call
/// that changes the page.
#[async_trait]
pub trait Navigator: Send {
    /// Main caption on the date view (the venue name).
    async fn venue_label(&mut self) -> Result<String, ScrapeError>;

    /// Sub caption with the currently displayed date.
    async fn current_date_label(&mut self) -> Result<String, ScrapeError>;

    /// False when the only panel on the page is the "no menus" message.
    async fn has_menu(&mut self) -> Result<bool, ScrapeError>;

    /// Move one day in `direction`. Fails with
    /// [`ScrapeError::NavigationUnavailable`] when the control is absent.
    async fn advance_date(&mut self, direction: Direction) -> Result<(), ScrapeError>;

    /// Meal tab labels in display order. Empty when there is no tab bar.
    async fn list_meal_tabs(&mut self) -> Result<Vec<String>, ScrapeError>;

    async fn select_meal_tab(&mut self, index: usize) -> Result<(), ScrapeError>;

    /// Course button labels for the selected meal.
    async fn list_course_buttons(&mut self) -> Result<Vec<String>, ScrapeError>;

    async fn select_course(&mut self, index: usize) -> Result<(), ScrapeError>;

    /// Main caption while a course is open (the course name).
    async fn panel_caption(&mut self) -> Result<String, ScrapeError>;

    async fn open_ingredients_panel(&mut self) -> Result<(), ScrapeError>;

    async fn open_nutrition_panel(&mut self) -> Result<(), ScrapeError>;

    /// Per-item nutrition buttons inside an open nutrition panel.
    async fn list_item_nutrition_buttons(&mut self) -> Result<Vec<String>, ScrapeError>;

    async fn select_item_nutrition(&mut self, index: usize) -> Result<(), ScrapeError>;

    /// Rendered document, handed to the page parser.
    async fn page_html(&mut self) -> Result<String, ScrapeError>;

    /// Settle, click the back control, settle.
    async fn go_back(&mut self) -> Result<(), ScrapeError>;

    /// Tear down the underlying session.
    async fn close(&mut self) {}
}

/// Fail with [`ScrapeError::ElementMissing`] when a re-listed index is gone.
pub fn check_index(what: &str, index: usize, len: usize) -> Result<(), ScrapeError> {
    if index < len {
        Ok(())
    } else {
        Err(ScrapeError::ElementMissing(format!(
            "{what} #{index} (only {len} listed)"
        )))
    }
}
