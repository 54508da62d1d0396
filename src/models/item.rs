//! Catalog item identity: name, ingredients, course and the flag vector.

use serde::{Deserialize, Serialize};

/// Diet and allergen flags carried by every catalog item.
///
/// Every field participates in the item's composite identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DietaryFlags {
    pub meat: bool,
    pub animal_products: bool,
    pub alcohol: bool,
    pub tree_nut: bool,
    pub shellfish: bool,
    pub peanuts: bool,
    pub dairy: bool,
    pub egg: bool,
    pub pork: bool,
    pub fish: bool,
    pub soy: bool,
    pub wheat: bool,
    pub gluten: bool,
    pub coconut: bool,
}

impl DietaryFlags {
    /// Derive flags from the raw diet code string and optional allergen list.
    ///
    /// Diet codes: `VG` (vegan) clears `animal_products`, `V` (vegetarian)
    /// clears `meat`, `GF` (gluten free) clears `gluten`. Returns the flags and
    /// any allergen names that did not match a known flag.
    pub fn from_raw(diets: &str, allergens: Option<&str>) -> (Self, Vec<String>) {
        let codes: Vec<&str> = split_list(diets).collect();
        let mut flags = Self {
            animal_products: !codes.contains(&"VG"),
            meat: !codes.contains(&"V"),
            gluten: !codes.contains(&"GF"),
            ..Self::default()
        };

        let mut unknown = Vec::new();
        if let Some(list) = allergens {
            for allergen in split_list(list) {
                if !flags.set_allergen(allergen) {
                    unknown.push(allergen.to_string());
                }
            }
        }
        (flags, unknown)
    }

    /// Set the flag named by an allergen label. Returns false for unknown labels.
    pub fn set_allergen(&mut self, allergen: &str) -> bool {
        let slug = allergen.trim().to_lowercase().replace([' ', '-'], "_");
        let flag = match slug.as_str() {
            "alcohol" => &mut self.alcohol,
            "tree_nut" | "tree_nuts" => &mut self.tree_nut,
            "shellfish" => &mut self.shellfish,
            "peanuts" | "peanut" => &mut self.peanuts,
            "dairy" | "milk" => &mut self.dairy,
            "egg" | "eggs" => &mut self.egg,
            "pork" => &mut self.pork,
            "fish" => &mut self.fish,
            "soy" => &mut self.soy,
            "wheat" => &mut self.wheat,
            "gluten" => &mut self.gluten,
            "coconut" => &mut self.coconut,
            _ => return false,
        };
        *flag = true;
        true
    }

    /// The same flags with `tree_nut` inverted.
    pub fn with_tree_nut_inverted(self) -> Self {
        Self {
            tree_nut: !self.tree_nut,
            ..self
        }
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(", ").map(str::trim).filter(|s| !s.is_empty())
}

/// Composite key that decides whether two observed items are the same catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub name: String,
    pub ingredients: String,
    pub course: String,
    pub flags: DietaryFlags,
}

impl ItemKey {
    /// The same key with only the tree-nut flag flipped.
    pub fn with_tree_nut_inverted(&self) -> ItemKey {
        ItemKey {
            flags: self.flags.with_tree_nut_inverted(),
            ..self.clone()
        }
    }
}

/// A persisted catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i32,
    pub key: ItemKey,
}
