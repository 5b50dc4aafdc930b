//! Filter translation and client-side post-filters

use super::RetrievalResult;
use concommerce_common::index::{fields, IndexFilter, IndexMatch, Predicate};
use concommerce_common::models::{MergedFilter, ScoredItem};

/// Index predicates for a merged filter.
///
/// A zero lower bound and an upper bound at the ceiling are omitted so
/// the index query is not over-constrained. Categories are never sent;
/// the index cannot match substrings.
pub fn index_filter(filter: &MergedFilter) -> IndexFilter {
    let mut index_filter = IndexFilter::new();

    if filter.price.has_lower_bound() {
        index_filter.push(Predicate::AtLeast {
            field: fields::PRICE_MIN,
            value: filter.price.min,
        });
    }
    if filter.price.has_upper_bound() {
        index_filter.push(Predicate::AtMost {
            field: fields::PRICE_MAX,
            value: filter.price.max,
        });
    }

    if !filter.brands.is_empty() {
        let values = filter.brands.iter().flat_map(|b| brand_variants(b)).fold(
            Vec::new(),
            |mut acc: Vec<String>, v| {
                if !acc.contains(&v) {
                    acc.push(v);
                }
                acc
            },
        );
        index_filter.push(Predicate::OneOf {
            field: fields::BRAND,
            values,
        });
    }

    if !filter.sources.is_empty() {
        index_filter.push(Predicate::OneOf {
            field: fields::SOURCE,
            values: filter.sources.iter().map(|s| s.as_str().to_string()).collect(),
        });
    }

    index_filter
}

/// Spellings of a brand as it may appear in catalog metadata
/// ("asus" -> "asus", "ASUS", "Asus")
pub fn brand_variants(brand: &str) -> Vec<String> {
    let brand = brand.trim();
    let mut title = String::with_capacity(brand.len());
    let mut chars = brand.chars();
    if let Some(first) = chars.next() {
        title.extend(first.to_uppercase());
        title.push_str(&chars.as_str().to_lowercase());
    }

    let mut variants = Vec::with_capacity(4);
    for variant in [brand.to_string(), brand.to_uppercase(), brand.to_lowercase(), title] {
        if !variant.is_empty() && !variants.contains(&variant) {
            variants.push(variant);
        }
    }
    variants
}

/// Candidates to request from the index; category matching happens
/// afterwards, so over-fetch when it will discard some
pub fn top_k(filter: &MergedFilter, limit: usize) -> usize {
    if filter.has_category_filter() {
        limit * 2
    } else {
        limit
    }
}

/// Apply threshold, category, containment, ordering and trim
pub fn post_filter(
    matches: Vec<IndexMatch>,
    filter: &MergedFilter,
    threshold: f32,
    limit: usize,
) -> RetrievalResult {
    let fetched = matches.len();

    let relevant: Vec<IndexMatch> = matches
        .into_iter()
        .filter(|m| m.score >= threshold)
        .collect();
    let above_threshold = relevant.len();

    let mut items: Vec<ScoredItem> = relevant
        .into_iter()
        .filter(|m| filter.matches_category(&m.item.category))
        .filter(|m| {
            filter
                .price
                .contains_interval(m.item.price_min, m.item.price_max)
        })
        .map(|m| ScoredItem {
            item: m.item,
            score: m.score,
        })
        .collect();

    // Stable: equal prices keep relevance order
    if filter.price.has_upper_bound() {
        items.sort_by_key(|scored| scored.item.price_min);
    }

    items.truncate(limit);

    RetrievalResult {
        items,
        fetched,
        above_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concommerce_common::models::{PriceRange, Source};
    use concommerce_testkit::catalog_item;

    fn scored(id: &str, min: u64, max: u64, score: f32) -> IndexMatch {
        IndexMatch {
            item: catalog_item(id, min, max),
            score,
        }
    }

    fn budget(min: u64, max: u64) -> MergedFilter {
        MergedFilter {
            price: PriceRange::new(min, max).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unrestricted_price_sends_no_predicates() {
        assert!(index_filter(&MergedFilter::default()).is_empty());
    }

    #[test]
    fn test_zero_lower_bound_is_omitted() {
        let filter = index_filter(&budget(0, 40_000));
        assert_eq!(
            filter.predicates(),
            &[Predicate::AtMost {
                field: fields::PRICE_MAX,
                value: 40_000
            }]
        );
    }

    #[test]
    fn test_membership_predicates() {
        let filter = index_filter(&MergedFilter {
            brands: vec!["asus".into()],
            sources: vec![Source::StarTech],
            categories: vec!["Laptop".into()],
            ..Default::default()
        });
        assert_eq!(filter.predicates().len(), 2);
        match &filter.predicates()[0] {
            Predicate::OneOf { field, values } => {
                assert_eq!(*field, fields::BRAND);
                assert!(values.contains(&"ASUS".to_string()));
                assert!(values.contains(&"Asus".to_string()));
            }
            other => panic!("unexpected predicate {other:?}"),
        }
    }

    #[test]
    fn test_category_filter_doubles_top_k() {
        let filter = MergedFilter {
            categories: vec!["Laptop".into()],
            ..Default::default()
        };
        assert_eq!(top_k(&filter, 10), 20);
        assert_eq!(top_k(&MergedFilter::default(), 10), 10);
    }

    #[test]
    fn test_straddling_candidate_is_excluded() {
        let result = post_filter(
            vec![scored("straddle", 20_000, 45_000, 0.9), scored("inside", 30_000, 38_000, 0.8)],
            &budget(0, 40_000),
            0.25,
            10,
        );
        let ids: Vec<_> = result.items.iter().map(|s| s.item.id.as_str()).collect();
        assert_eq!(ids, vec!["inside"]);
        assert_eq!(result.fetched, 2);
    }

    #[test]
    fn test_threshold_applies_before_price_filter() {
        let result = post_filter(
            vec![scored("weak", 1_000, 1_000, 0.1), scored("strong", 1_000, 1_000, 0.6)],
            &MergedFilter::default(),
            0.35,
            10,
        );
        assert_eq!(result.above_threshold, 1);
        assert_eq!(result.items[0].item.id, "strong");
    }

    #[test]
    fn test_budget_sorts_cheapest_first() {
        let result = post_filter(
            vec![
                scored("mid", 60_000, 60_000, 0.9),
                scored("cheap", 40_000, 40_000, 0.5),
                scored("top", 90_000, 95_000, 0.7),
            ],
            &budget(0, 100_000),
            0.25,
            10,
        );
        let ids: Vec<_> = result.items.iter().map(|s| s.item.id.as_str()).collect();
        assert_eq!(ids, vec!["cheap", "mid", "top"]);
    }

    #[test]
    fn test_no_budget_keeps_relevance_order_and_trims() {
        let result = post_filter(
            vec![
                scored("a", 90_000, 90_000, 0.9),
                scored("b", 10_000, 10_000, 0.8),
                scored("c", 50_000, 50_000, 0.7),
            ],
            &MergedFilter::default(),
            0.25,
            2,
        );
        let ids: Vec<_> = result.items.iter().map(|s| s.item.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_category_is_substring_match() {
        let mut laptop = scored("laptop", 50_000, 50_000, 0.9);
        laptop.item.category = "Laptop/Gaming Laptop".into();
        let mut monitor = scored("monitor", 20_000, 20_000, 0.9);
        monitor.item.category = "Monitor".into();

        let filter = MergedFilter {
            categories: vec!["gaming laptop".into()],
            ..Default::default()
        };
        let result = post_filter(vec![laptop, monitor], &filter, 0.25, 10);
        assert_eq!(result.len(), 1);
        assert_eq!(result.items[0].item.id, "laptop");
    }
}
