//! Keyword tables and text normalization shared by the router and the
//! budget guard

use regex_lite::Regex;
use std::sync::OnceLock;

/// Device, category, spec and price vocabulary. Presence of any of these
/// marks a message as a product query.
const PRODUCT_TERMS: &[&str] = &[
    // devices and categories
    "laptop", "laptops", "notebook", "notebooks", "macbook", "ultrabook", "chromebook",
    "desktop", "desktops", "pc", "pcs", "computer", "computers", "workstation", "monitor",
    "monitors", "display", "phone", "phones", "smartphone", "mobile", "tablet", "tablets",
    "ipad", "mouse", "keyboard", "headphone", "headphones", "headset", "earbuds", "speaker",
    "speakers", "webcam", "printer", "router", "ups", "camera", "console", "gpu", "cpu",
    "processor", "motherboard", "ssd", "hdd", "ram", "memory", "storage", "graphics",
    "charger", "cable", "adapter", "bag", "backpack", "cooler", "casing",
    // brands commonly named without a product
    "asus", "acer", "lenovo", "hp", "dell", "msi", "apple", "samsung", "xiaomi", "gigabyte",
    "intel", "amd", "nvidia", "ryzen", "rtx", "gtx", "radeon", "logitech", "razer", "corsair",
    // spec words
    "gaming", "core", "i3", "i5", "i7", "i9", "ddr4", "ddr5", "nvme", "ips", "oled", "fhd",
    "4k", "battery", "wifi", "bluetooth", "specs", "specification", "specifications",
    // price words
    "price", "prices", "budget", "cheap", "expensive", "affordable", "tk", "taka", "bdt",
    "cost", "costs",
];

/// Words that point back at previously shown items
const DEICTIC_CUES: &[&str] = &[
    "which", "better", "best", "that", "this", "those", "these", "it", "them", "they",
    "one", "ones", "first", "second", "third", "fourth", "fifth", "last", "former",
    "latter", "cheaper", "faster", "worth", "recommend", "prefer", "either", "both",
];

/// Phrases that always read as a follow-up on shown items
const FOLLOW_UP_PHRASES: &[&str] = &[
    "which is better",
    "which one is better",
    "which one should i",
    "which should i",
    "which one do you",
    "tell me more",
    "more about",
    "more details",
    "more info",
    "compare them",
    "compare these",
    "compare those",
    "compare both",
    "difference between them",
    "differences between them",
    "whats the difference",
    "what is the difference",
    "pros and cons",
    "is it worth",
    "are they worth",
    "any of these",
    "any of them",
    "out of these",
    "from these",
    "from the list",
];

const GREETINGS: &[&str] = &[
    "hi", "hello", "hey", "hiya", "howdy", "yo", "greetings", "good morning",
    "good afternoon", "good evening", "assalamualaikum", "salam", "how are you",
    "whats up", "sup",
];

const THANKS: &[&str] = &[
    "thanks", "thank you", "thx", "ty", "many thanks", "appreciate it", "ok thanks",
    "okay thanks", "great thanks", "cheers", "thank you so much", "thanks a lot",
];

const FAREWELLS: &[&str] = &[
    "bye", "goodbye", "good bye", "see you", "see ya", "cya", "good night", "take care",
    "later", "bye bye",
];

/// Kind of small talk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasualKind {
    Greeting,
    Thanks,
    Farewell,
}

/// Lowercase, drop apostrophes, turn other punctuation into spaces
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\'' && *c != '\u{2019}')
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized whitespace tokens
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text).split(' ').filter(|t| !t.is_empty()).map(str::to_string).collect()
}

fn numeric_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{3,}|\d+k|\d+(gb|tb|hz|mhz|ghz|inch|in|w|mah))$")
            .unwrap_or_else(|e| panic!("invalid numeric token pattern: {e}"))
    })
}

fn ordinal_reference() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(first|second|third|fourth|fifth|last|1st|2nd|3rd|4th|5th) (one|option|item|choice|product)\b|\b(option|number|no) \d\b",
        )
        .unwrap_or_else(|e| panic!("invalid ordinal pattern: {e}"))
    })
}

/// Whether a token is product-domain vocabulary (including price figures
/// and unit-suffixed specs)
pub fn is_product_term(token: &str) -> bool {
    PRODUCT_TERMS.contains(&token) || numeric_token().is_match(token)
}

/// Whether any token is product-domain vocabulary
pub fn has_product_term(tokens: &[String]) -> bool {
    tokens.iter().any(|t| is_product_term(t))
}

/// Whether any token points back at shown items
pub fn has_deictic_cue(tokens: &[String]) -> bool {
    tokens.iter().any(|t| DEICTIC_CUES.contains(&t.as_str()))
}

/// Whether normalized text contains an ordinal reference ("the second one")
pub fn has_ordinal_reference(normalized: &str) -> bool {
    ordinal_reference().is_match(normalized)
}

/// Whether normalized text contains an explicit follow-up phrase or an
/// ordinal reference
pub fn is_follow_up_phrase(normalized: &str) -> bool {
    let padded = format!(" {} ", normalized);
    FOLLOW_UP_PHRASES
        .iter()
        .any(|phrase| padded.contains(&format!(" {} ", phrase)))
        || has_ordinal_reference(normalized)
}

fn matches_phrase(normalized: &str, phrases: &[&str]) -> bool {
    phrases.contains(&normalized)
}

/// Casual kind when the normalized text is exactly a greeting, thanks or
/// farewell phrase
pub fn casual_kind(normalized: &str) -> Option<CasualKind> {
    if matches_phrase(normalized, THANKS) {
        Some(CasualKind::Thanks)
    } else if matches_phrase(normalized, FAREWELLS) {
        Some(CasualKind::Farewell)
    } else if matches_phrase(normalized, GREETINGS) {
        Some(CasualKind::Greeting)
    } else {
        None
    }
}

/// Whether a token is one of `words` (case-insensitive)
pub fn matches_any(token: &str, words: &[String]) -> bool {
    words.iter().any(|w| w.eq_ignore_ascii_case(token))
}
