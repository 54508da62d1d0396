//! [`Navigator`] over a live chromiumoxide page.
//!
//! Every call queries the DOM afresh; no element handle outlives the call
//! that looked it up.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use tracing::debug;

use super::BrowserSession;
use crate::scrapers::error::ScrapeError;
use crate::scrapers::navigator::{check_index, settle, Direction, Navigator};

const MAIN_CAPTION: &str = ".label-main-caption";
const SUB_CAPTION: &str = ".label-sub-caption";
const PANEL: &str = ".v-panel-content";
const TAB_BAR: &str = ".v-tabsheet";
const TAB_CAPTION: &str = ".v-caption";
const COURSE_BUTTONS: &str = "div.v-verticallayout.v-layout.menu-sub-view .v-button";
/// Ingredients (index 0) and Nutrition Facts (index 1) buttons of an open course.
const SELECTION_BUTTONS: &str = ".v-button.v-widget.multiline.v-button-multiline.selection.v-button-selection.icon-align-right.v-button-icon-align-right.v-has-width";
const ITEM_NUTRITION_BUTTONS: &str = ".v-button.nutrition";
const BACK_BUTTON: &str = ".button-navigation--previous .v-button";
const PREVIOUS_DATE: &str = ".button-date-selection--previous";
const NEXT_DATE: &str = ".button-date-selection--next";

fn driver_error(e: CdpError) -> ScrapeError {
    ScrapeError::from_driver_message(e.to_string())
}

pub struct ChromiumNavigator {
    session: Option<BrowserSession>,
    page: Page,
    settle_delay: Duration,
}

impl ChromiumNavigator {
    pub fn new(session: BrowserSession, page: Page, settle_delay: Duration) -> Self {
        Self {
            session: Some(session),
            page,
            settle_delay,
        }
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Element>, ScrapeError> {
        match self.page.find_elements(selector).await {
            Ok(elements) => Ok(elements),
            // chromiumoxide reports an empty match as a lookup error
            Err(CdpError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(driver_error(e)),
        }
    }

    async fn find_one(&self, selector: &str) -> Result<Element, ScrapeError> {
        self.find_all(selector)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ScrapeError::ElementMissing(selector.to_string()))
    }

    async fn text_of(element: &Element) -> Result<String, ScrapeError> {
        Ok(element
            .inner_text()
            .await
            .map_err(driver_error)?
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    async fn labels(elements: &[Element]) -> Result<Vec<String>, ScrapeError> {
        let mut labels = Vec::with_capacity(elements.len());
        for element in elements {
            labels.push(Self::text_of(element).await?);
        }
        Ok(labels)
    }

    async fn caption(&self, selector: &str) -> Result<String, ScrapeError> {
        let element = self.find_one(selector).await?;
        Self::text_of(&element).await
    }

    async fn tabs(&self) -> Result<Vec<Element>, ScrapeError> {
        let bars = self.find_all(TAB_BAR).await?;
        let Some(bar) = bars.first() else {
            return Ok(Vec::new());
        };
        match bar.find_elements(TAB_CAPTION).await {
            Ok(tabs) => Ok(tabs),
            Err(CdpError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(driver_error(e)),
        }
    }

    /// Click element `index` of `selector` and wait for the UI to settle.
    async fn click_nth(&self, what: &str, selector: &str, index: usize) -> Result<(), ScrapeError> {
        let elements = self.find_all(selector).await?;
        check_index(what, index, elements.len())?;
        self.click(&elements[index]).await
    }

    async fn click(&self, element: &Element) -> Result<(), ScrapeError> {
        element.click().await.map_err(driver_error)?;
        settle(self.settle_delay).await;
        Ok(())
    }
}

#[async_trait]
impl Navigator for ChromiumNavigator {
    async fn venue_label(&mut self) -> Result<String, ScrapeError> {
        self.caption(MAIN_CAPTION).await
    }

    async fn current_date_label(&mut self) -> Result<String, ScrapeError> {
        self.caption(SUB_CAPTION).await
    }

    async fn has_menu(&mut self) -> Result<bool, ScrapeError> {
        // a lone panel is the "no menus" message
        Ok(self.find_all(PANEL).await?.len() != 1)
    }

    async fn advance_date(&mut self, direction: Direction) -> Result<(), ScrapeError> {
        let selector = match direction {
            Direction::Previous => PREVIOUS_DATE,
            Direction::Next => NEXT_DATE,
        };
        let Some(button) = self.find_all(selector).await?.into_iter().next() else {
            return Err(ScrapeError::NavigationUnavailable(direction));
        };
        debug!("Clicking {} date", direction);
        self.click(&button).await
    }

    async fn list_meal_tabs(&mut self) -> Result<Vec<String>, ScrapeError> {
        let tabs = self.tabs().await?;
        Self::labels(&tabs).await
    }

    async fn select_meal_tab(&mut self, index: usize) -> Result<(), ScrapeError> {
        settle(self.settle_delay).await;
        let tabs = self.tabs().await?;
        check_index("meal tab", index, tabs.len())?;
        self.click(&tabs[index]).await
    }

    async fn list_course_buttons(&mut self) -> Result<Vec<String>, ScrapeError> {
        let buttons = self.find_all(COURSE_BUTTONS).await?;
        Self::labels(&buttons).await
    }

    async fn select_course(&mut self, index: usize) -> Result<(), ScrapeError> {
        self.click_nth("course", COURSE_BUTTONS, index).await
    }

    async fn panel_caption(&mut self) -> Result<String, ScrapeError> {
        self.caption(MAIN_CAPTION).await
    }

    async fn open_ingredients_panel(&mut self) -> Result<(), ScrapeError> {
        self.click_nth("ingredients button", SELECTION_BUTTONS, 0).await?;
        settle(self.settle_delay).await;
        Ok(())
    }

    async fn open_nutrition_panel(&mut self) -> Result<(), ScrapeError> {
        self.click_nth("nutrition button", SELECTION_BUTTONS, 1).await
    }

    async fn list_item_nutrition_buttons(&mut self) -> Result<Vec<String>, ScrapeError> {
        let buttons = self.find_all(ITEM_NUTRITION_BUTTONS).await?;
        Self::labels(&buttons).await
    }

    async fn select_item_nutrition(&mut self, index: usize) -> Result<(), ScrapeError> {
        self.click_nth("item nutrition button", ITEM_NUTRITION_BUTTONS, index)
            .await
    }

    async fn page_html(&mut self) -> Result<String, ScrapeError> {
        self.page.content().await.map_err(driver_error)
    }

    async fn go_back(&mut self) -> Result<(), ScrapeError> {
        settle(self.settle_delay).await;
        let back = self.find_one(BACK_BUTTON).await?;
        self.click(&back).await
    }

    async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}
