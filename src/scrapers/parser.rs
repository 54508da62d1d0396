//! Page parser for the ingredients and nutrition panels.
//!
//! Both functions take the rendered document HTML so they can run without a
//! browser. Panel shape surprises are logged and parsed best-effort; they are
//! never fatal.

use indexmap::IndexMap;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::models::{NutrientKey, NutrientValue, NutritionFacts, RawIngredients};

/// Container holding the flat list of ingredient rows.
const INGREDIENTS_CONTAINER: &str = ".v-verticallayout.v-layout.v-vertical.v-widget.v-has-width.v-margin-top.v-margin-right.v-margin-bottom.v-margin-left .v-verticallayout";
const ROW_CLASS: &str = "v-slot";
const LABEL: &str = ".v-label";
const ALLERGENS_PREFIX: &str = "Allergens:";

const NUTRITION_CAPTION: &str = ".v-panel-content .v-panel-captionwrap";
const NUTRITION_LISTS: &str = ".v-panel-content ul";
const NUTRITION_HEADING: &str = "Nutrition Facts";

/// One row of the ingredients panel: its label texts and full text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngredientRow {
    pub labels: Vec<String>,
    pub text: String,
}

impl IngredientRow {
    pub fn new(labels: &[&str], text: &str) -> Self {
        Self {
            labels: labels.iter().map(|s| s.to_string()).collect(),
            text: text.to_string(),
        }
    }
}

/// Which kind of row the parser expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowState {
    Title,
    Ingredients,
    Allergens,
}

fn selector(css: &str) -> Selector {
    // Selectors are compile-time constants.
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e:?}"))
}

/// Visible text of an element with whitespace between text nodes.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract ingredient rows from the rendered document.
pub fn ingredient_rows(html: &str) -> Vec<IngredientRow> {
    let document = Html::parse_document(html);
    let Some(container) = document.select(&selector(INGREDIENTS_CONTAINER)).next() else {
        warn!("Ingredients panel container not found");
        return Vec::new();
    };
    let label = selector(LABEL);

    container
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().classes().any(|c| c == ROW_CLASS))
        .map(|row| IngredientRow {
            labels: row.select(&label).map(element_text).collect(),
            text: element_text(row),
        })
        .collect()
}

/// Parse the ingredients panel in `html`.
pub fn parse_ingredients_panel(html: &str) -> IndexMap<String, RawIngredients> {
    parse_ingredient_rows(&ingredient_rows(html))
}

/// Walk the row cycle title -> ingredients -> optional allergens.
///
/// The allergens row is recognized only by its prefix; when it is missing
/// the row is treated as the next item's title.
pub fn parse_ingredient_rows(rows: &[IngredientRow]) -> IndexMap<String, RawIngredients> {
    debug!("Found {} rows of ingredients data", rows.len());
    let mut items: IndexMap<String, RawIngredients> = IndexMap::new();
    let mut current: Option<String> = None;
    let mut state = RowState::Title;
    let mut i = 0;

    while i < rows.len() {
        let row = &rows[i];
        match state {
            RowState::Title => {
                let title = row
                    .labels
                    .first()
                    .cloned()
                    .unwrap_or_else(|| row.text.clone());
                let diets = row.labels.get(1).cloned().unwrap_or_default();
                items.insert(
                    title.clone(),
                    RawIngredients {
                        diets,
                        ..Default::default()
                    },
                );
                current = Some(title);
                state = RowState::Ingredients;
                i += 1;
            }
            RowState::Ingredients => {
                if let Some(entry) = current.as_ref().and_then(|t| items.get_mut(t)) {
                    entry.ingredients = row.text.clone();
                }
                state = RowState::Allergens;
                i += 1;
            }
            RowState::Allergens => {
                if let Some(rest) = row.text.strip_prefix(ALLERGENS_PREFIX) {
                    if let Some(entry) = current.as_ref().and_then(|t| items.get_mut(t)) {
                        entry.allergens = Some(rest.trim().to_string());
                    }
                    i += 1;
                }
                state = RowState::Title;
            }
        }
    }
    items
}

/// Serving size from the caption, without heading or surrounding parentheses.
fn serving_size(document: &Html) -> Option<String> {
    let caption = document.select(&selector(NUTRITION_CAPTION)).next()?;
    let text = caption
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != NUTRITION_HEADING)
        .collect::<Vec<_>>()
        .join(" ");
    let text = text
        .strip_prefix(NUTRITION_HEADING)
        .map(str::trim)
        .unwrap_or(&text);
    let text = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(text);
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Parse a nutrition facts pane (for a course or a single item).
///
/// The pane has two side-by-side lists: labels and amounts on the left,
/// percent daily values on the right. Rows are zipped by position and left
/// rows without text are padding.
pub fn parse_nutrition_panel(html: &str) -> NutritionFacts {
    let document = Html::parse_document(html);
    let mut facts = NutritionFacts {
        serving_size: serving_size(&document),
        ..Default::default()
    };

    let lists: Vec<ElementRef<'_>> = document.select(&selector(NUTRITION_LISTS)).collect();
    if lists.len() != 2 {
        warn!(
            "Expected 2 lists on nutrition pane, found {}; parsing best-effort",
            lists.len()
        );
    }
    let (Some(left), Some(right)) = (lists.first(), lists.get(1)) else {
        return facts;
    };

    let span = selector("span");
    let left_rows = left.children().filter_map(ElementRef::wrap);
    let right_rows = right.children().filter_map(ElementRef::wrap);

    for (lside, rside) in left_rows.zip(right_rows) {
        if element_text(lside).is_empty() {
            continue;
        }
        let spans: Vec<String> = lside.select(&span).map(element_text).collect();
        let (Some(label), Some(amount)) = (spans.first(), spans.get(1)) else {
            warn!("Skipping nutrition row without label/amount: {:?}", spans);
            continue;
        };
        let label = label.trim_start_matches("- ").trim();

        let rtext = element_text(rside);
        let rtext = rtext.trim_matches(|c: char| c == ' ' || c == '%');
        let percent_daily_value = if rtext.is_empty() {
            None
        } else {
            match rtext.parse::<i32>() {
                Ok(v) => Some(v),
                Err(_) => {
                    debug!("Ignoring unreadable daily value '{}' for {}", rtext, label);
                    None
                }
            }
        };

        facts.nutrients.insert(
            NutrientKey::from_label(label),
            NutrientValue::new(amount.clone(), percent_daily_value),
        );
    }
    facts
}
