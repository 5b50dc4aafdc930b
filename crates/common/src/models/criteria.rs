//! Structured search criteria interpreted from free text

use super::item::{PriceRange, Source, Specs};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Spec hints share the catalog spec shape
pub type SpecHints = Specs;

/// How many products the user expects to see
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductCount {
    Single,
    Multiple,
    Comparison,
    Any,
}

impl FromStr for ProductCount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(ProductCount::Single),
            "multiple" => Ok(ProductCount::Multiple),
            "comparison" => Ok(ProductCount::Comparison),
            "any" => Ok(ProductCount::Any),
            other => Err(format!("unknown product count '{}'", other)),
        }
    }
}

/// What the user wants to do with the products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentAction {
    Find,
    Compare,
    Recommend,
    Info,
}

impl FromStr for IntentAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "find" => Ok(IntentAction::Find),
            "compare" => Ok(IntentAction::Compare),
            "recommend" => Ok(IntentAction::Recommend),
            "info" => Ok(IntentAction::Info),
            other => Err(format!("unknown intent action '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Intent {
    pub product_count: ProductCount,
    pub action: IntentAction,
}

impl Intent {
    pub fn new(product_count: ProductCount, action: IntentAction) -> Self {
        Self {
            product_count,
            action,
        }
    }
}

/// Criteria extracted from one query. Every field is optional; an absent
/// field leaves the corresponding user filter untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<PriceRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brands: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specs: Option<SpecHints>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
}

impl SearchCriteria {
    pub fn is_empty(&self) -> bool {
        self == &SearchCriteria::default()
    }
}
