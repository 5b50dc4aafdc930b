//! User filter state and its merge with interpreted criteria

use super::item::{PriceRange, Source};
use serde::{Deserialize, Serialize};

/// Filters set by the user in the UI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub price: PriceRange,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub brands: Vec<String>,
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// Filters actually applied to a search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedFilter {
    pub price: PriceRange,
    pub categories: Vec<String>,
    pub brands: Vec<String>,
    pub sources: Vec<Source>,
}

impl MergedFilter {
    /// Whether category matching must run after retrieval
    pub fn has_category_filter(&self) -> bool {
        !self.categories.is_empty()
    }

    /// Whether an item's category contains any requested category
    /// (case-insensitive substring)
    pub fn matches_category(&self, category: &str) -> bool {
        if self.categories.is_empty() {
            return true;
        }
        let category = category.to_lowercase();
        self.categories
            .iter()
            .any(|wanted| category.contains(&wanted.to_lowercase()))
    }
}

impl From<FilterState> for MergedFilter {
    fn from(state: FilterState) -> Self {
        Self {
            price: state.price,
            categories: state.categories,
            brands: state.brands,
            sources: state.sources,
        }
    }
}
