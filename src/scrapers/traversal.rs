//! Walks one venue's menu from a starting date to the first date without data.
//!
//! The walk is a small state machine over [`Navigator`] calls:
//!
//! ```text
//! SeekingStart -> AtDate -> IteratingMeals -> IteratingCourses -> ReadingCourse
//!                   ^                                                  |
//!                   +------------- append day, advance date <---------+
//! ```
//!
//! Each completed day is appended to the checkpoint before the date is
//! advanced, so a retryable failure mid-day only loses that partial day.
//! Meal and course names are recorded as the page shows them; ingestion
//! canonicalizes them.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::checkpoint::{CheckpointStore, ResumePoint};
use super::error::ScrapeError;
use super::navigator::{check_index, settle, Direction, Navigator};
use super::parser::{parse_ingredients_panel, parse_nutrition_panel};
use crate::models::{parse_menu_date, Course, Day, Meal};

/// Knobs for a venue walk.
#[derive(Debug, Clone)]
pub struct TraversalOptions {
    pub settle_delay: Duration,
    /// Minimum meal tabs for a day to count as having data.
    pub min_meals: usize,
    /// Upper bound on date steps while seeking the start date.
    pub max_seek_steps: usize,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            min_meals: 2,
            max_seek_steps: 400,
        }
    }
}

/// Shared flag for cooperative cancellation between days and venues.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalState {
    SeekingStart,
    AtDate,
    IteratingMeals,
    IteratingCourses,
    ReadingCourse,
}

impl fmt::Display for TraversalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SeekingStart => "seeking start",
            Self::AtDate => "at date",
            Self::IteratingMeals => "iterating meals",
            Self::IteratingCourses => "iterating courses",
            Self::ReadingCourse => "reading course",
        };
        f.write_str(name)
    }
}

/// Summary of a finished walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalOutcome {
    pub days_scraped: usize,
    pub meals: usize,
    pub items: usize,
    pub last_date: Option<NaiveDate>,
}

/// One walk over one venue using one navigator.
pub struct VenueTraversal<'a> {
    nav: &'a mut dyn Navigator,
    options: TraversalOptions,
    cancel: Option<CancellationFlag>,
    state: TraversalState,
}

impl<'a> VenueTraversal<'a> {
    pub fn new(nav: &'a mut dyn Navigator, options: TraversalOptions) -> Self {
        Self {
            nav,
            options,
            cancel: None,
            state: TraversalState::SeekingStart,
        }
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// State the walk was in when it last stopped.
    pub fn state(&self) -> TraversalState {
        self.state
    }

    /// Walk `venue` from `resume` until a date has no usable menu.
    ///
    /// Days are appended to `checkpoint` under `venue` as they complete.
    /// Days at or before the venue's last checkpointed day are skipped.
    pub async fn run(
        &mut self,
        checkpoint: &mut CheckpointStore,
        venue: &str,
        resume: ResumePoint,
    ) -> Result<TraversalOutcome, ScrapeError> {
        let mut outcome = TraversalOutcome::default();

        self.state = TraversalState::SeekingStart;
        if !self.seek_start(resume).await? {
            info!("{}: resume date {:?} is past the last available date", venue, resume.date());
            return Ok(outcome);
        }

        loop {
            if self.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }

            self.state = TraversalState::AtDate;
            let date = self.current_date().await?;
            debug!("{}: parsing date {}", venue, date);

            if !self.nav.has_menu().await? {
                info!("{}: no menu on {}, done", venue, date);
                break;
            }

            let skip = checkpoint.last_day(venue).is_some_and(|last| date <= last);
            if skip {
                debug!("{}: {} already checkpointed", venue, date);
            } else {
                let tab_count = self.nav.list_meal_tabs().await?.len();
                if tab_count < self.options.min_meals {
                    info!(
                        "{}: only {} meal tab(s) on {}, done",
                        venue, tab_count, date
                    );
                    break;
                }

                let day = self.scrape_day(date, tab_count).await?;
                outcome.days_scraped += 1;
                outcome.meals += day.meals.len();
                outcome.items += day.item_count();
                outcome.last_date = Some(date);
                checkpoint.append_day(venue, day)?;
            }

            match self.nav.advance_date(Direction::Next).await {
                Ok(()) => {}
                Err(ScrapeError::NavigationUnavailable(Direction::Next)) => {
                    info!("{}: no later dates after {}", venue, date);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(outcome)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationFlag::is_cancelled)
    }

    async fn current_date(&mut self) -> Result<NaiveDate, ScrapeError> {
        let label = self.nav.current_date_label().await?;
        parse_menu_date(&label).ok_or(ScrapeError::UnparseableDate(label))
    }

    /// Position the view on the first date to scrape.
    ///
    /// Returns `false` when the resume date lies beyond the last date the
    /// application offers.
    async fn seek_start(&mut self, resume: ResumePoint) -> Result<bool, ScrapeError> {
        match resume {
            ResumePoint::Date(target) => self.seek_date(target).await,
            ResumePoint::Earliest => {
                self.seek_earliest().await?;
                Ok(true)
            }
        }
    }

    /// Step toward `target`.
    ///
    /// A target before the first published date lands on that first date:
    /// stepping back past a menu onto the "no menu" page, or running out of
    /// earlier dates, ends the seek one step forward of there.
    async fn seek_date(&mut self, target: NaiveDate) -> Result<bool, ScrapeError> {
        let mut passed_menu = false;
        for _ in 0..self.options.max_seek_steps {
            let current = self.current_date().await?;
            if current == target {
                return Ok(true);
            }

            if current < target {
                match self.nav.advance_date(Direction::Next).await {
                    Ok(()) => continue,
                    Err(ScrapeError::NavigationUnavailable(Direction::Next)) => return Ok(false),
                    Err(e) => return Err(e),
                }
            }

            let has_menu = self.nav.has_menu().await?;
            if !has_menu && passed_menu {
                info!("{} precedes the first published date", target);
                self.nav.advance_date(Direction::Next).await?;
                return Ok(true);
            }
            passed_menu |= has_menu;

            match self.nav.advance_date(Direction::Previous).await {
                Ok(()) => {}
                Err(ScrapeError::NavigationUnavailable(Direction::Previous)) => {
                    debug!("No dates before {}; starting from the first one offered", current);
                    if !has_menu {
                        self.nav.advance_date(Direction::Next).await?;
                    }
                    return Ok(true);
                }
                Err(e) => return Err(e),
            }
        }
        Err(ScrapeError::SeekExhausted {
            steps: self.options.max_seek_steps,
        })
    }

    /// Step back until the "no menu" page, then one step forward.
    async fn seek_earliest(&mut self) -> Result<(), ScrapeError> {
        for _ in 0..self.options.max_seek_steps {
            if !self.nav.has_menu().await? {
                return self.nav.advance_date(Direction::Next).await;
            }
            match self.nav.advance_date(Direction::Previous).await {
                Ok(()) => settle(self.options.settle_delay).await,
                Err(ScrapeError::NavigationUnavailable(Direction::Previous)) => {
                    debug!("No earlier dates; starting from the first one offered");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
        Err(ScrapeError::SeekExhausted {
            steps: self.options.max_seek_steps,
        })
    }

    async fn scrape_day(&mut self, date: NaiveDate, tab_count: usize) -> Result<Day, ScrapeError> {
        let mut day = Day::new(date);
        self.state = TraversalState::IteratingMeals;
        info!("Found {} tabs on {}", tab_count, date);

        for index in 0..tab_count {
            let tabs = self.nav.list_meal_tabs().await?;
            check_index("meal tab", index, tabs.len())?;
            self.nav.select_meal_tab(index).await?;
            let name = tabs[index].clone();
            debug!("Checking tab {}", name);

            let courses = self.scrape_meal().await?;
            day.meals.push(Meal { name, courses });
        }
        Ok(day)
    }

    async fn scrape_meal(&mut self) -> Result<Vec<Course>, ScrapeError> {
        self.state = TraversalState::IteratingCourses;
        let count = self.nav.list_course_buttons().await?.len();
        debug!("Found {} courses in this meal", count);

        let mut courses = Vec::with_capacity(count);
        for index in 0..count {
            let buttons = self.nav.list_course_buttons().await?;
            check_index("course", index, buttons.len())?;
            self.nav.select_course(index).await?;

            courses.push(self.scrape_course().await?);

            self.state = TraversalState::IteratingCourses;
            self.nav.go_back().await?;
        }
        Ok(courses)
    }

    /// Read an opened course: ingredients panel, then per-item nutrition.
    async fn scrape_course(&mut self) -> Result<Course, ScrapeError> {
        self.state = TraversalState::ReadingCourse;
        let mut course = Course {
            name: self.nav.panel_caption().await?,
            ..Default::default()
        };
        debug!("Parsing course {}", course.name);

        self.nav.open_ingredients_panel().await?;
        course.ingredients = parse_ingredients_panel(&self.nav.page_html().await?);
        self.nav.go_back().await?;

        self.nav.open_nutrition_panel().await?;
        let count = self.nav.list_item_nutrition_buttons().await?.len();
        for index in 0..count {
            let buttons = self.nav.list_item_nutrition_buttons().await?;
            check_index("item nutrition button", index, buttons.len())?;
            let item_name = buttons[index].clone();
            debug!("Reading nutrition facts for {}", item_name);
            self.nav.select_item_nutrition(index).await?;

            let facts = parse_nutrition_panel(&self.nav.page_html().await?);
            if facts.is_empty() {
                warn!("Empty nutrition pane for {}", item_name);
            }
            course.nutrition.insert(item_name, facts);
            self.nav.go_back().await?;
        }
        self.nav.go_back().await?;
        Ok(course)
    }
}
