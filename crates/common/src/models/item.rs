//! Catalog items and price intervals

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper end of the default price filter. A bound at or above this value
/// is treated as unrestricted.
pub const PRICE_CEILING: u64 = 500_000;

/// Largest price accepted from interpreted criteria
pub const PRICE_SANITY_LIMIT: u64 = 10_000_000;

/// Sales channel an item is listed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    StarTech,
    Daraz,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::StarTech, Source::Daraz];

    /// Name as stored in index metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::StarTech => "StarTech",
            Source::Daraz => "Daraz",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "startech" => Ok(Source::StarTech),
            "daraz" => Ok(Source::Daraz),
            _ => Err(format!("unknown source '{}'", s)),
        }
    }
}

/// Inclusive price interval in integer currency units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: u64,
    pub max: u64,
}

impl PriceRange {
    /// Build a range, rejecting inverted bounds
    pub fn new(min: u64, max: u64) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }

    /// The unrestricted default range
    pub fn full() -> Self {
        Self {
            min: 0,
            max: PRICE_CEILING,
        }
    }

    /// Whether a lower bound constrains results
    pub fn has_lower_bound(&self) -> bool {
        self.min > 0
    }

    /// Whether an upper bound below the ceiling constrains results
    pub fn has_upper_bound(&self) -> bool {
        self.max < PRICE_CEILING
    }

    /// Whether either bound constrains results
    pub fn is_active(&self) -> bool {
        self.has_lower_bound() || self.has_upper_bound()
    }

    /// Whether the interval `[low, high]` lies entirely inside this range
    pub fn contains_interval(&self, low: u64, high: u64) -> bool {
        let above_floor = low >= self.min;
        let below_ceiling = !self.has_upper_bound() || high <= self.max;
        above_floor && below_ceiling
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        Self::full()
    }
}

/// Optional hardware attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Specs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphics: Option<String>,
}

impl Specs {
    /// Labelled spec values that are present
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("Processor", self.processor.as_deref()),
            ("RAM", self.ram.as_deref()),
            ("Storage", self.storage.as_deref()),
            ("Graphics", self.graphics.as_deref()),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.filter(|v| !v.trim().is_empty()).map(|v| (label, v)))
        .collect()
    }
}

/// A product as stored in the catalog index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub price_min: u64,
    pub price_max: u64,
    /// Slash-delimited hierarchy, e.g. "Laptop/Gaming Laptop"
    pub category: String,
    pub brand: String,
    pub source: Source,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub specs: Specs,
    #[serde(default)]
    pub warranty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u32>,
}

impl CatalogItem {
    /// "45,000 Tk" or "40,000 - 45,000 Tk"
    pub fn price_label(&self, currency: &str) -> String {
        if self.price_min == self.price_max {
            format!("{} {}", format_amount(self.price_min), currency)
        } else {
            format!(
                "{} - {} {}",
                format_amount(self.price_min),
                format_amount(self.price_max),
                currency
            )
        }
    }
}

/// A retrieved item with its opaque similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item: CatalogItem,
    pub score: f32,
}

/// Format an amount with thousands separators
pub fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_rejects_inverted_bounds() {
        assert!(PriceRange::new(5_000, 1_000).is_none());
        assert_eq!(PriceRange::new(0, 40_000).unwrap().max, 40_000);
    }

    #[test]
    fn test_straddling_interval_is_not_contained() {
        let range = PriceRange::new(0, 40_000).unwrap();
        assert!(!range.contains_interval(20_000, 45_000));
        assert!(range.contains_interval(20_000, 40_000));
    }

    #[test]
    fn test_full_range_is_inactive() {
        let range = PriceRange::full();
        assert!(!range.is_active());
        assert!(range.contains_interval(0, 2_000_000));
    }

    #[test]
    fn test_source_parsing_is_lenient() {
        assert_eq!("star tech".parse::<Source>().unwrap(), Source::StarTech);
        assert_eq!("DARAZ".parse::<Source>().unwrap(), Source::Daraz);
        assert!("amazon".parse::<Source>().is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(999), "999");
        assert_eq!(format_amount(45_000), "45,000");
        assert_eq!(format_amount(1_250_000), "1,250,000");
    }

    #[test]
    fn test_spec_entries_skip_blank_values() {
        let specs = Specs {
            processor: Some("Ryzen 5 5600H".into()),
            ram: Some("  ".into()),
            storage: None,
            graphics: Some("RTX 3050".into()),
        };
        let labels: Vec<_> = specs.entries().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["Processor", "Graphics"]);
    }
}
