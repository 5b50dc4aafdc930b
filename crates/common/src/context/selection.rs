//! Selection Resolver - maps the generator's declared selection back to
//! candidates
//!
//! Every grounded answer must end with
//! `{"selected_products": [1, 3]}`, either bare or in a fenced block.
//! Positions are 1-based references into the candidate list the answer
//! was grounded on. Prose mentions of products are never parsed.

use crate::metrics;
use crate::models::{CatalogItem, Intent, ProductCount};
use regex_lite::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

/// Key of the selection object
pub const SELECTION_KEY: &str = "selected_products";

/// Why a reply carried no usable selection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("reply has no selection object")]
    Missing,

    #[error("selection object is malformed: {0}")]
    Malformed(String),
}

/// Reply split into narrative text and the selection payload
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    /// Narrative with the selection object and its fencing removed
    pub narrative: String,
    /// 1-based positions in declaration order, or why there are none
    pub selection: Result<Vec<usize>, SelectionError>,
}

/// Items to display for one reply
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub items: Vec<CatalogItem>,
    pub narrative: String,
    /// Why the intent-keyed slice was used instead of a declared selection
    pub fallback: Option<SelectionError>,
}

impl Resolution {
    pub fn fell_back(&self) -> bool {
        self.fallback.is_some()
    }
}

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(\{.*?\})\s*```")
            .unwrap_or_else(|e| panic!("invalid fenced block pattern: {e}"))
    })
}

/// An opening fence left unclosed right before a bare object
fn fence_opener() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"```[A-Za-z]*[ \t]*\r?\n?$")
            .unwrap_or_else(|e| panic!("invalid fence opener pattern: {e}"))
    })
}

/// Split a raw reply into narrative and declared selection
pub fn parse_reply(raw: &str) -> ParsedReply {
    match locate(raw) {
        Some((start, end, json)) => {
            let mut narrative = String::with_capacity(raw.len());
            narrative.push_str(&raw[..start]);
            narrative.push_str(&raw[end..]);
            ParsedReply {
                narrative: narrative.trim().to_string(),
                selection: parse_payload(json),
            }
        }
        None => ParsedReply {
            narrative: raw.trim().to_string(),
            selection: Err(SelectionError::Missing),
        },
    }
}

/// Byte span to strip and the JSON text inside it
fn locate(raw: &str) -> Option<(usize, usize, &str)> {
    // The last fenced block naming the key wins
    let fenced = fenced_block()
        .captures_iter(raw)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let json = caps.get(1)?;
            json.as_str()
                .contains(SELECTION_KEY)
                .then(|| (whole.start(), whole.end(), json.as_str()))
        })
        .last();
    if fenced.is_some() {
        return fenced;
    }

    // Bare trailing object. One cut short by the token limit is still
    // stripped from its opening brace to the end.
    let key = raw.rfind(SELECTION_KEY)?;
    let start = raw[..key].rfind('{')?;
    let tail = &raw[start..];
    let mut stream = serde_json::Deserializer::from_str(tail).into_iter::<Value>();
    let (end, json) = match stream.next() {
        Some(Ok(_)) => {
            let end = start + stream.byte_offset();
            (end, &raw[start..end])
        }
        _ => (raw.len(), tail.trim_end()),
    };
    let before = &raw[..start];
    let unclosed_fence = before.matches("```").count() % 2 == 1;
    let start = fence_opener()
        .find(before)
        .filter(|_| unclosed_fence)
        .map_or(start, |opener| opener.start());
    Some((start, end, json))
}

fn parse_payload(json: &str) -> Result<Vec<usize>, SelectionError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| SelectionError::Malformed(e.to_string()))?;

    let entries = value
        .get(SELECTION_KEY)
        .and_then(Value::as_array)
        .ok_or_else(|| SelectionError::Malformed(format!("'{}' is not a list", SELECTION_KEY)))?;

    let mut positions = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(position) = reference(entry)? else {
            tracing::debug!(reference = %entry, "Dropped reference outside any candidate list");
            continue;
        };
        if !positions.contains(&position) {
            positions.push(position);
        }
    }
    Ok(positions)
}

/// Position named by one entry. Numbers that can never be a 1-based
/// position (negative, fractional) yield `None`.
fn reference(entry: &Value) -> Result<Option<usize>, SelectionError> {
    let number = match entry {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) => Ok((n >= 1.0 && n.fract() == 0.0).then_some(n as usize)),
        None => Err(SelectionError::Malformed(format!("invalid reference {}", entry))),
    }
}

/// Number of candidates shown when a reply has no usable selection
pub fn fallback_size(intent: Option<&Intent>) -> usize {
    match intent.map(|i| i.product_count) {
        Some(ProductCount::Single) => 1,
        Some(ProductCount::Comparison) => 3,
        Some(ProductCount::Multiple) | Some(ProductCount::Any) | None => 5,
    }
}

/// Resolve a raw reply against the candidates it was grounded on
pub fn resolve(raw: &str, candidates: &[CatalogItem], intent: Option<&Intent>) -> Resolution {
    let parsed = parse_reply(raw);

    match parsed.selection {
        Ok(positions) => {
            let items: Vec<CatalogItem> = positions
                .iter()
                .filter(|&&p| p >= 1 && p <= candidates.len())
                .map(|&p| candidates[p - 1].clone())
                .collect();

            if items.len() < positions.len() {
                tracing::debug!(
                    declared = positions.len(),
                    kept = items.len(),
                    candidates = candidates.len(),
                    "Dropped out-of-range selection references"
                );
            }

            Resolution {
                items,
                narrative: parsed.narrative,
                fallback: None,
            }
        }
        Err(e) => {
            let size = fallback_size(intent).min(candidates.len());
            tracing::warn!(
                error = %e,
                fallback_size = size,
                "Selection unusable, showing leading candidates"
            );
            metrics::record_selection_fallback();

            Resolution {
                items: candidates[..size].to_vec(),
                narrative: parsed.narrative,
                fallback: Some(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IntentAction, Source, Specs};

    fn candidates(n: usize) -> Vec<CatalogItem> {
        (1..=n)
            .map(|i| CatalogItem {
                id: format!("p{}", i),
                name: format!("Product {}", i),
                price_min: 1_000 * i as u64,
                price_max: 1_000 * i as u64,
                category: "Laptop".into(),
                brand: "Acer".into(),
                source: Source::Daraz,
                url: String::new(),
                image: None,
                specs: Specs::default(),
                warranty: String::new(),
                availability: None,
                rating: None,
                review_count: None,
            })
            .collect()
    }

    fn ids(items: &[CatalogItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_bare_trailing_object() {
        let raw = "Product 1 is great for gaming, Product 3 is cheaper.\n{\"selected_products\": [1, 3]}";
        let resolution = resolve(raw, &candidates(5), None);
        assert_eq!(ids(&resolution.items), vec!["p1", "p3"]);
        assert!(!resolution.fell_back());
        assert!(!resolution.narrative.contains("selected_products"));
        assert!(!resolution.narrative.contains('{'));
        assert!(resolution.narrative.ends_with("cheaper."));
    }

    #[test]
    fn test_fenced_object_is_stripped_with_fence() {
        let raw = "Here you go.\n\n```json\n{\"selected_products\": [2]}\n```\n";
        let resolution = resolve(raw, &candidates(5), None);
        assert_eq!(ids(&resolution.items), vec!["p2"]);
        assert_eq!(resolution.narrative, "Here you go.");
    }

    #[test]
    fn test_declaration_order_is_kept() {
        let raw = "Compare these.\n{\"selected_products\": [4, 2, 4]}";
        let resolution = resolve(raw, &candidates(5), None);
        assert_eq!(ids(&resolution.items), vec!["p4", "p2"]);
    }

    #[test]
    fn test_out_of_range_references_are_dropped() {
        let raw = "Text\n{\"selected_products\": [0, 2, 9]}";
        let resolution = resolve(raw, &candidates(3), None);
        assert_eq!(ids(&resolution.items), vec!["p2"]);
        assert!(!resolution.fell_back());
    }

    #[test]
    fn test_missing_object_falls_back_by_intent() {
        let intent = Intent::new(ProductCount::Comparison, IntentAction::Compare);
        let resolution = resolve("Both are good choices.", &candidates(5), Some(&intent));
        assert_eq!(ids(&resolution.items), vec!["p1", "p2", "p3"]);
        assert!(resolution.fell_back());
        assert_eq!(resolution.narrative, "Both are good choices.");
    }

    #[test]
    fn test_fallback_sizes() {
        let single = Intent::new(ProductCount::Single, IntentAction::Find);
        let multiple = Intent::new(ProductCount::Multiple, IntentAction::Find);
        assert_eq!(fallback_size(Some(&single)), 1);
        assert_eq!(fallback_size(Some(&multiple)), 5);
        assert_eq!(fallback_size(None), 5);
        assert_eq!(resolve("text", &candidates(2), None).items.len(), 2);
    }

    #[test]
    fn test_malformed_object_is_distinct_from_missing() {
        let parsed = parse_reply("Nice picks, no list this time.");
        assert_eq!(parsed.selection, Err(SelectionError::Missing));

        let parsed = parse_reply("Nice picks.\n{\"selected_products\": \"1,2\"}");
        assert!(matches!(parsed.selection, Err(SelectionError::Malformed(_))));
        assert_eq!(parsed.narrative, "Nice picks.");

        let parsed = parse_reply("Nice picks.\n```json\n{\"selected_products\": [1,]}\n```");
        assert!(matches!(parsed.selection, Err(SelectionError::Malformed(_))));
        assert_eq!(parsed.narrative, "Nice picks.");
    }

    #[test]
    fn test_truncated_object_is_stripped_and_malformed() {
        let resolution = resolve("P2 is best.\n{\"selected_products\": [2, 7", &candidates(5), None);
        assert_eq!(resolution.narrative, "P2 is best.");
        assert!(matches!(resolution.fallback, Some(SelectionError::Malformed(_))));

        let parsed = parse_reply("P2 is best.\n\n```json\n{\"selected_products\": [2");
        assert_eq!(parsed.narrative, "P2 is best.");
        assert!(matches!(parsed.selection, Err(SelectionError::Malformed(_))));
    }

    #[test]
    fn test_text_after_bare_object_is_kept() {
        let parsed = parse_reply("Go with P1. {\"selected_products\": [1]} Happy shopping!");
        assert_eq!(parsed.selection, Ok(vec![1]));
        assert_eq!(parsed.narrative, "Go with P1.  Happy shopping!");
    }

    #[test]
    fn test_negative_and_fractional_references_are_dropped() {
        let resolution = resolve("Text\n{\"selected_products\": [-1, 2]}", &candidates(5), None);
        assert_eq!(ids(&resolution.items), vec!["p2"]);
        assert!(!resolution.fell_back());

        let resolution = resolve("Text\n{\"selected_products\": [2.0, 3.5]}", &candidates(5), None);
        assert_eq!(ids(&resolution.items), vec!["p2"]);
        assert!(!resolution.fell_back());

        let parsed = parse_reply("Text {\"selected_products\": [1, true]}");
        assert!(matches!(parsed.selection, Err(SelectionError::Malformed(_))));
    }

    #[test]
    fn test_empty_selection_shows_nothing() {
        let resolution = resolve("General advice.\n{\"selected_products\": []}", &candidates(4), None);
        assert!(resolution.items.is_empty());
        assert!(!resolution.fell_back());
    }

    #[test]
    fn test_string_references_are_accepted() {
        let parsed = parse_reply("ok {\"selected_products\": [\"1\", \"3\"]}");
        assert_eq!(parsed.selection, Ok(vec![1, 3]));
    }
}
