//! Criteria Interpreter - turns a free-text query into search criteria
//!
//! Extraction is delegated to the text generator with a fixed schema.
//! The reply is validated field by field: a field that fails validation
//! is dropped on its own, and any failure of the call itself degrades to
//! empty criteria.

use crate::llm::{GenerationPurpose, GenerationRequest, GeneratorPool};
use crate::models::{
    GenerationBackend, Intent, PriceRange, SearchCriteria, Source, SpecHints, PRICE_CEILING,
    PRICE_SANITY_LIMIT,
};
use serde_json::{Map, Value};

/// Interpreter settings
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_tokens: 400,
            temperature: 0.0,
        }
    }
}

/// Query interpreter backed by the generator pool
#[derive(Clone)]
pub struct CriteriaInterpreter {
    generators: GeneratorPool,
    config: InterpreterConfig,
}

impl CriteriaInterpreter {
    pub fn new(generators: GeneratorPool, config: InterpreterConfig) -> Self {
        Self { generators, config }
    }

    /// Interpret a query. Never fails; returns empty criteria when the
    /// generator is unavailable or replies with something unusable.
    pub async fn interpret(&self, query: &str, preferred: GenerationBackend) -> SearchCriteria {
        let query = query.trim();
        if query.is_empty() {
            return SearchCriteria::default();
        }

        let request = GenerationRequest {
            purpose: GenerationPurpose::CriteriaExtraction,
            instructions: extraction_instructions(),
            prompt: format!("Query: {}", query),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let generation = match self.generators.generate(preferred, &request).await {
            Ok(generation) => generation,
            Err(e) => {
                tracing::warn!(error = %e, "Criteria extraction unavailable, continuing without criteria");
                return SearchCriteria::default();
            }
        };

        match parse_criteria(&generation.text) {
            Some(criteria) => {
                tracing::debug!(criteria = ?criteria, "Interpreted query criteria");
                criteria
            }
            None => {
                tracing::warn!(
                    backend = %generation.backend,
                    "Criteria extraction returned no usable JSON object"
                );
                SearchCriteria::default()
            }
        }
    }
}

fn extraction_instructions() -> String {
    format!(
        r#"You extract shopping search criteria from a customer's query for an electronics catalog (prices in Bangladeshi Taka).
Reply with ONE JSON object and nothing else, using exactly these keys (omit or null any key the query does not mention):
{{
  "priceRange": {{"min": number, "max": number}},
  "brands": [string],
  "categories": [string],
  "sources": ["StarTech" | "Daraz"],
  "specs": {{"processor": string, "ram": string, "storage": string, "graphics": string}},
  "intent": {{"productCount": "single" | "multiple" | "comparison" | "any", "action": "find" | "compare" | "recommend" | "info"}}
}}
Price conventions:
- "under X" / "below X" / "within X" -> {{"min": 0, "max": X}}
- "above X" / "over X" -> {{"min": X, "max": {ceiling}}}
- "between X and Y" -> {{"min": X, "max": Y}}
- "around X" / "about X" -> {{"min": X*0.9, "max": X*1.1}} rounded to the nearest 1000
- a bare amount "X" -> {{"min": X*0.85, "max": X*1.15}} rounded to the nearest 1000
- "50k" means 50000, "1 lakh" means 100000
Categories are short product classes such as "Laptop", "Gaming Laptop", "Desktop", "Monitor", "Mouse".
Use productCount "single" when the customer wants one best pick, "comparison" when they compare named options, "any" for general questions that need no product list, otherwise "multiple"."#,
        ceiling = PRICE_CEILING
    )
}

/// Parse and validate a generator reply. `None` when no JSON object can
/// be found at all.
pub fn parse_criteria(raw: &str) -> Option<SearchCriteria> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }

    let object = match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(Value::Object(map)) => map,
        _ => return None,
    };

    Some(SearchCriteria {
        price: object.get("priceRange").and_then(validate_price),
        brands: object.get("brands").and_then(validate_strings),
        categories: object.get("categories").and_then(validate_strings),
        sources: object.get("sources").and_then(validate_sources),
        specs: object.get("specs").and_then(validate_specs),
        intent: object.get("intent").and_then(validate_intent),
    })
}

/// Numbers may arrive as JSON numbers or numeric strings ("45,000")
fn amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    }
}

fn bound(object: &Map<String, Value>, key: &str) -> Result<Option<u64>, ()> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let amount = amount(value).ok_or(())?;
            if !amount.is_finite() || amount < 0.0 || amount > PRICE_SANITY_LIMIT as f64 {
                return Err(());
            }
            Ok(Some(amount.round() as u64))
        }
    }
}

fn validate_price(value: &Value) -> Option<PriceRange> {
    let object = value.as_object()?;
    let min = bound(object, "min").ok()?;
    let max = bound(object, "max").ok()?;
    if min.is_none() && max.is_none() {
        return None;
    }
    let min = min.unwrap_or(0);
    PriceRange::new(min, max.unwrap_or(PRICE_CEILING.max(min)))
}

fn validate_strings(value: &Value) -> Option<Vec<String>> {
    let values: Vec<String> = value
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!values.is_empty()).then_some(values)
}

fn validate_sources(value: &Value) -> Option<Vec<Source>> {
    let mut sources = Vec::new();
    for source in validate_strings(value)?.iter().filter_map(|s| s.parse::<Source>().ok()) {
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    (!sources.is_empty()).then_some(sources)
}

fn validate_specs(value: &Value) -> Option<SpecHints> {
    let object = value.as_object()?;
    let field = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let specs = SpecHints {
        processor: field("processor"),
        ram: field("ram"),
        storage: field("storage"),
        graphics: field("graphics"),
    };
    (specs != SpecHints::default()).then_some(specs)
}

fn validate_intent(value: &Value) -> Option<Intent> {
    let object = value.as_object()?;
    let product_count = object.get("productCount")?.as_str()?.parse().ok()?;
    let action = object.get("action")?.as_str()?.parse().ok()?;
    Some(Intent::new(product_count, action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IntentAction, ProductCount};

    #[test]
    fn test_full_reply_is_parsed() {
        let criteria = parse_criteria(
            r#"```json
            {"priceRange": {"min": 0, "max": 100000}, "brands": ["AMD"], "categories": ["Desktop", "Gaming PC"],
             "sources": null, "specs": {"processor": "Ryzen"}, "intent": {"productCount": "multiple", "action": "find"}}
            ```"#,
        )
        .unwrap();
        assert_eq!(criteria.price, PriceRange::new(0, 100_000));
        assert_eq!(criteria.brands, Some(vec!["AMD".to_string()]));
        assert_eq!(criteria.categories.as_ref().map(Vec::len), Some(2));
        assert!(criteria.sources.is_none());
        assert_eq!(criteria.specs.unwrap().processor.as_deref(), Some("Ryzen"));
        assert_eq!(
            criteria.intent,
            Some(Intent::new(ProductCount::Multiple, IntentAction::Find))
        );
    }

    #[test]
    fn test_invalid_fields_are_dropped_individually() {
        let criteria = parse_criteria(
            r#"{"priceRange": {"min": -5, "max": 1000}, "brands": ["", "HP"],
                "sources": ["Amazon"], "intent": {"productCount": "several", "action": "find"}}"#,
        )
        .unwrap();
        assert!(criteria.price.is_none());
        assert_eq!(criteria.brands, Some(vec!["HP".to_string()]));
        assert!(criteria.sources.is_none());
        assert!(criteria.intent.is_none());
    }

    #[test]
    fn test_price_sanity_bound() {
        let criteria =
            parse_criteria(r#"{"priceRange": {"min": 0, "max": 99999999999}}"#).unwrap();
        assert!(criteria.price.is_none());
    }

    #[test]
    fn test_inverted_price_is_dropped() {
        let criteria = parse_criteria(r#"{"priceRange": {"min": 50000, "max": 20000}}"#).unwrap();
        assert!(criteria.price.is_none());
    }

    #[test]
    fn test_open_bounds_are_filled() {
        let criteria = parse_criteria(r#"{"priceRange": {"min": 80000}}"#).unwrap();
        assert_eq!(criteria.price, PriceRange::new(80_000, PRICE_CEILING));

        let criteria = parse_criteria(r#"{"priceRange": {"max": "45,000"}}"#).unwrap();
        assert_eq!(criteria.price, PriceRange::new(0, 45_000));
    }

    #[test]
    fn test_open_upper_bound_above_ceiling_is_kept() {
        let criteria = parse_criteria(r#"{"priceRange": {"min": 600000}}"#).unwrap();
        let price = criteria.price.unwrap();
        assert_eq!(price.min, 600_000);
        assert!(price.has_lower_bound());
        assert!(!price.has_upper_bound());
    }

    #[test]
    fn test_sources_are_deduplicated() {
        let criteria = parse_criteria(r#"{"sources": ["startech", "StarTech", "daraz"]}"#).unwrap();
        assert_eq!(criteria.sources, Some(vec![Source::StarTech, Source::Daraz]));
    }

    #[test]
    fn test_non_json_reply() {
        assert!(parse_criteria("I could not understand the query").is_none());
        assert!(parse_criteria("[1, 2, 3]").is_none());
    }
}
