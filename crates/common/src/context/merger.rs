//! Filter Merger - combines UI filters with interpreted criteria
//!
//! Price and source from the query replace the UI value; brands and
//! categories are unioned. Anything the query does not mention passes
//! through unchanged.

use crate::models::{FilterState, MergedFilter, SearchCriteria, Source};

/// Merge filter state with criteria. Pure and deterministic.
pub fn merge(filter: &FilterState, criteria: &SearchCriteria) -> MergedFilter {
    MergedFilter {
        price: criteria.price.unwrap_or(filter.price),
        categories: match &criteria.categories {
            Some(categories) => union(&filter.categories, categories),
            None => filter.categories.clone(),
        },
        brands: match &criteria.brands {
            Some(brands) => union(&filter.brands, brands),
            None => filter.brands.clone(),
        },
        sources: match &criteria.sources {
            Some(sources) => dedup_sources(sources),
            None => filter.sources.clone(),
        },
    }
}

/// Case-insensitive union in first-seen order
fn union(base: &[String], extra: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(base.len() + extra.len());
    for value in base.iter().chain(extra) {
        if !merged.iter().any(|m| m.eq_ignore_ascii_case(value)) {
            merged.push(value.clone());
        }
    }
    merged
}

fn dedup_sources(sources: &[Source]) -> Vec<Source> {
    let mut unique = Vec::with_capacity(sources.len());
    for source in sources {
        if !unique.contains(source) {
            unique.push(*source);
        }
    }
    unique
}
