//! Scripted in-memory menu application for driving traversals in tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};

use menuscrape::models::MENU_DATE_FMT;
use menuscrape::scrapers::navigator::check_index;
use menuscrape::scrapers::{
    CancellationFlag, Direction, Navigator, ScrapeError, SessionFactory,
};

#[derive(Debug, Clone)]
pub struct FakeItem {
    pub name: String,
    pub diets: String,
    pub ingredients: String,
    pub allergens: Option<String>,
    /// `None` hides the item's nutrition button.
    pub calories: Option<String>,
    pub sodium: Option<String>,
}

impl FakeItem {
    pub fn new(name: &str, diets: &str, ingredients: &str, allergens: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            diets: diets.to_string(),
            ingredients: ingredients.to_string(),
            allergens: allergens.map(str::to_string),
            calories: Some("252 kcal".to_string()),
            sodium: Some("139 mg".to_string()),
        }
    }

    pub fn without_nutrition(mut self) -> Self {
        self.calories = None;
        self.sodium = None;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FakeCourse {
    pub name: String,
    pub items: Vec<FakeItem>,
}

#[derive(Debug, Clone)]
pub struct FakeMeal {
    pub name: String,
    pub courses: Vec<FakeCourse>,
}

#[derive(Debug, Clone)]
pub struct FakeDay {
    pub date: NaiveDate,
    pub meals: Vec<FakeMeal>,
}

impl FakeDay {
    /// Breakfast, lunch and an "OC Dinner" tab.
    pub fn full(date: NaiveDate) -> Self {
        let dessert = FakeCourse {
            name: "Yale Bakery Dessert".to_string(),
            items: vec![FakeItem::new(
                "Baker`s Brownie",
                "V",
                "flour, cocoa, walnuts",
                Some("Tree Nut, Wheat"),
            )],
        };
        let entree = FakeCourse {
            name: "Entree".to_string(),
            items: vec![
                FakeItem::new("Chicken Tikka", "", "chicken, yogurt, spices", Some("Dairy")),
                FakeItem::new("Fruit Cup", "V, VG, GF", "melon, grapes", None).without_nutrition(),
            ],
        };
        Self {
            date,
            meals: vec![
                FakeMeal {
                    name: "Breakfast".to_string(),
                    courses: vec![dessert.clone()],
                },
                FakeMeal {
                    name: "Lunch".to_string(),
                    courses: vec![entree.clone()],
                },
                FakeMeal {
                    name: "OC Dinner".to_string(),
                    courses: vec![entree, dessert],
                },
            ],
        }
    }

    /// A day with a single meal tab (too few to count).
    pub fn sparse(date: NaiveDate) -> Self {
        let mut day = Self::full(date);
        day.meals.truncate(1);
        day
    }
}

pub fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

/// Consecutive full days starting at `first`.
pub fn full_days(first: NaiveDate, count: usize) -> Vec<FakeDay> {
    (0..count)
        .map(|i| FakeDay::full(first + Duration::days(i as i64)))
        .collect()
}

/// UI failure injected the next time a course is selected on `date`.
#[derive(Debug, Clone)]
pub struct Fault {
    pub date: NaiveDate,
    pub error: fn(String) -> ScrapeError,
}

/// State shared across sessions opened from one factory.
#[derive(Debug, Default)]
pub struct SiteLog {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    /// Dates whose first meal tab was clicked, in order.
    pub scraped: Mutex<Vec<NaiveDate>>,
    pub faults: Mutex<VecDeque<Fault>>,
    pub cancel_on: Mutex<Option<(NaiveDate, CancellationFlag)>>,
}

impl SiteLog {
    pub fn scraped(&self) -> Vec<NaiveDate> {
        self.scraped.lock().unwrap().clone()
    }

    pub fn push_fault(&self, date: NaiveDate, error: fn(String) -> ScrapeError) {
        self.faults.lock().unwrap().push_back(Fault { date, error });
    }

    pub fn cancel_on(&self, date: NaiveDate, flag: CancellationFlag) {
        *self.cancel_on.lock().unwrap() = Some((date, flag));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Dates,
    Course(usize),
    Ingredients(usize),
    Nutrition(usize),
    ItemNutrition(usize, usize),
}

/// One open session on the fake menu application.
///
/// Positions `-1` and `days.len()` are the "no menus" pages around the
/// published range; the date controls stop there.
pub struct FakeMenuSite {
    caption: String,
    days: Vec<FakeDay>,
    pos: i64,
    meal: usize,
    screen: Screen,
    log: Arc<SiteLog>,
}

impl FakeMenuSite {
    pub fn new(caption: &str, days: Vec<FakeDay>, start: usize, log: Arc<SiteLog>) -> Self {
        Self {
            caption: caption.to_string(),
            days,
            pos: start as i64,
            meal: 0,
            screen: Screen::Dates,
            log,
        }
    }

    fn day(&self) -> Option<&FakeDay> {
        usize::try_from(self.pos).ok().and_then(|i| self.days.get(i))
    }

    fn date(&self) -> NaiveDate {
        match self.days.first() {
            Some(first) => first.date + Duration::days(self.pos),
            None => date(1),
        }
    }

    fn meal(&self) -> Result<&FakeMeal, ScrapeError> {
        self.day()
            .and_then(|d| d.meals.get(self.meal))
            .ok_or_else(|| ScrapeError::ElementMissing("meal".into()))
    }

    fn course(&self, index: usize) -> Result<&FakeCourse, ScrapeError> {
        self.meal()?
            .courses
            .get(index)
            .ok_or_else(|| ScrapeError::ElementMissing("course".into()))
    }

    fn nutrition_items(&self, course: usize) -> Result<Vec<&FakeItem>, ScrapeError> {
        Ok(self
            .course(course)?
            .items
            .iter()
            .filter(|i| i.calories.is_some())
            .collect())
    }

    fn on_dates(&self, action: &str) -> Result<(), ScrapeError> {
        if self.screen == Screen::Dates {
            Ok(())
        } else {
            Err(ScrapeError::NotInteractable(format!("{action} outside date view")))
        }
    }
}

fn ingredients_html(course: &FakeCourse) -> String {
    let mut rows = String::new();
    for item in &course.items {
        rows.push_str(&format!(
            r#"<div class="v-slot"><div class="v-label">{}</div><div class="v-label">{}</div></div>"#,
            item.name, item.diets
        ));
        rows.push_str(&format!(
            r#"<div class="v-slot"><div class="v-label-undef">{}</div></div>"#,
            item.ingredients
        ));
        if let Some(allergens) = &item.allergens {
            rows.push_str(&format!(
                r#"<div class="v-slot"><div class="v-label-undef">Allergens: {allergens}</div></div>"#
            ));
        }
    }
    format!(
        r#"<html><body>
        <div class="v-verticallayout v-layout v-vertical v-widget v-has-width v-margin-top v-margin-right v-margin-bottom v-margin-left">
          <div class="v-verticallayout">{rows}</div>
        </div></body></html>"#
    )
}

fn nutrition_html(item: &FakeItem) -> String {
    let mut left = String::new();
    let mut right = String::new();
    if let Some(calories) = &item.calories {
        left.push_str(&format!("<li><span>Calories</span><span>{calories}</span></li>"));
        right.push_str("<li></li>");
    }
    if let Some(sodium) = &item.sodium {
        left.push_str(&format!("<li><span>Sodium</span><span>{sodium}</span></li>"));
        right.push_str("<li>6 %</li>");
    }
    format!(
        r#"<html><body><div class="v-panel-content">
        <div class="v-panel-captionwrap"><div>Nutrition Facts</div><div>(1 each)</div></div>
        <ul>{left}</ul><ul>{right}</ul>
        </div></body></html>"#
    )
}

#[async_trait]
impl Navigator for FakeMenuSite {
    async fn venue_label(&mut self) -> Result<String, ScrapeError> {
        Ok(self.caption.clone())
    }

    async fn current_date_label(&mut self) -> Result<String, ScrapeError> {
        Ok(self.date().format(MENU_DATE_FMT).to_string())
    }

    async fn has_menu(&mut self) -> Result<bool, ScrapeError> {
        Ok(self.day().is_some_and(|d| !d.meals.is_empty()))
    }

    async fn advance_date(&mut self, direction: Direction) -> Result<(), ScrapeError> {
        self.on_dates("date step")?;
        match direction {
            Direction::Previous if self.pos <= -1 => {
                return Err(ScrapeError::NavigationUnavailable(direction))
            }
            Direction::Next if self.pos >= self.days.len() as i64 => {
                return Err(ScrapeError::NavigationUnavailable(direction))
            }
            Direction::Previous => self.pos -= 1,
            Direction::Next => self.pos += 1,
        }
        self.meal = 0;
        Ok(())
    }

    async fn list_meal_tabs(&mut self) -> Result<Vec<String>, ScrapeError> {
        Ok(self
            .day()
            .map(|d| d.meals.iter().map(|m| m.name.clone()).collect())
            .unwrap_or_default())
    }

    async fn select_meal_tab(&mut self, index: usize) -> Result<(), ScrapeError> {
        self.on_dates("tab click")?;
        let count = self.day().map_or(0, |d| d.meals.len());
        check_index("meal tab", index, count)?;
        self.meal = index;

        if index == 0 {
            let today = self.date();
            self.log.scraped.lock().unwrap().push(today);
            let mut cancel_on = self.log.cancel_on.lock().unwrap();
            if let Some((when, flag)) = cancel_on.as_ref() {
                if *when == today {
                    flag.cancel();
                    *cancel_on = None;
                }
            }
        }
        Ok(())
    }

    async fn list_course_buttons(&mut self) -> Result<Vec<String>, ScrapeError> {
        Ok(self.meal()?.courses.iter().map(|c| c.name.clone()).collect())
    }

    async fn select_course(&mut self, index: usize) -> Result<(), ScrapeError> {
        let today = self.date();
        {
            let mut faults = self.log.faults.lock().unwrap();
            if let Some(pos) = faults.iter().position(|f| f.date == today) {
                let fault = faults.remove(pos).unwrap();
                return Err((fault.error)(format!("course button on {today}")));
            }
        }
        let count = self.meal()?.courses.len();
        check_index("course", index, count)?;
        self.screen = Screen::Course(index);
        Ok(())
    }

    async fn panel_caption(&mut self) -> Result<String, ScrapeError> {
        match self.screen {
            Screen::Course(c) => Ok(self.course(c)?.name.clone()),
            _ => Err(ScrapeError::ElementMissing("panel caption".into())),
        }
    }

    async fn open_ingredients_panel(&mut self) -> Result<(), ScrapeError> {
        match self.screen {
            Screen::Course(c) => {
                self.screen = Screen::Ingredients(c);
                Ok(())
            }
            _ => Err(ScrapeError::ElementMissing("ingredients button".into())),
        }
    }

    async fn open_nutrition_panel(&mut self) -> Result<(), ScrapeError> {
        match self.screen {
            Screen::Course(c) => {
                self.screen = Screen::Nutrition(c);
                Ok(())
            }
            _ => Err(ScrapeError::ElementMissing("nutrition button".into())),
        }
    }

    async fn list_item_nutrition_buttons(&mut self) -> Result<Vec<String>, ScrapeError> {
        match self.screen {
            Screen::Nutrition(c) => Ok(self
                .nutrition_items(c)?
                .into_iter()
                .map(|i| i.name.clone())
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    async fn select_item_nutrition(&mut self, index: usize) -> Result<(), ScrapeError> {
        match self.screen {
            Screen::Nutrition(c) => {
                check_index("item nutrition button", index, self.nutrition_items(c)?.len())?;
                self.screen = Screen::ItemNutrition(c, index);
                Ok(())
            }
            _ => Err(ScrapeError::ElementMissing("item nutrition button".into())),
        }
    }

    async fn page_html(&mut self) -> Result<String, ScrapeError> {
        match self.screen {
            Screen::Ingredients(c) => Ok(ingredients_html(self.course(c)?)),
            Screen::ItemNutrition(c, i) => {
                let items = self.nutrition_items(c)?;
                Ok(nutrition_html(items[i]))
            }
            _ => Ok("<html><body></body></html>".to_string()),
        }
    }

    async fn go_back(&mut self) -> Result<(), ScrapeError> {
        self.screen = match self.screen {
            Screen::Dates => return Err(ScrapeError::ElementMissing("back button".into())),
            Screen::Course(_) => Screen::Dates,
            Screen::Ingredients(c) | Screen::Nutrition(c) => Screen::Course(c),
            Screen::ItemNutrition(c, _) => Screen::Nutrition(c),
        };
        Ok(())
    }

    async fn close(&mut self) {
        self.log.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Venue published by the fake application.
#[derive(Debug, Clone)]
pub struct FakeVenue {
    pub caption: String,
    pub days: Vec<FakeDay>,
    /// Index of the date shown when the page opens.
    pub start: usize,
}

/// Opens [`FakeMenuSite`] sessions keyed by venue id.
pub struct FakeSessions {
    pub venues: Vec<(u32, FakeVenue)>,
    pub log: Arc<SiteLog>,
}

impl FakeSessions {
    pub fn new(venues: Vec<(u32, FakeVenue)>) -> Self {
        Self {
            venues,
            log: Arc::new(SiteLog::default()),
        }
    }
}

#[async_trait]
impl SessionFactory for FakeSessions {
    async fn open(&self, venue_id: u32) -> Result<Box<dyn Navigator>, ScrapeError> {
        let (_, venue) = self
            .venues
            .iter()
            .find(|(id, _)| *id == venue_id)
            .ok_or_else(|| ScrapeError::Browser(format!("no venue {venue_id}")))?;
        self.log.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeMenuSite::new(
            &venue.caption,
            venue.days.clone(),
            venue.start,
            self.log.clone(),
        )))
    }
}
