//! Context Router - decides how each incoming message is handled
//!
//! Classification is an ordered rule table evaluated top to bottom; the
//! first rule whose predicate holds decides the route. Keeping precedence
//! in the table (product vocabulary beats a greeting, explicit follow-ups
//! beat small talk and the short-message heuristic) makes it testable on its own.

use super::vocabulary::{self, CasualKind};
use crate::models::{
    recent_window, CatalogItem, ConversationTurn, Intent, IntentAction, ProductCount, Role,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest message treated as a short follow-up
pub const SHORT_FOLLOW_UP_TOKENS: usize = 5;

/// Routing decision for one message
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Small talk; answered without any external call
    Casual(CasualKind),
    /// Follow-up on the items most recently shown
    Contextual { prior_items: Vec<CatalogItem> },
    /// New search
    Fresh,
}

impl Route {
    pub fn kind(&self) -> RouteKind {
        match self {
            Route::Casual(_) => RouteKind::Casual,
            Route::Contextual { .. } => RouteKind::Contextual,
            Route::Fresh => RouteKind::Fresh,
        }
    }
}

/// Route label reported in response metadata and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Casual,
    Contextual,
    Fresh,
}

impl RouteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteKind::Casual => "casual",
            RouteKind::Contextual => "contextual",
            RouteKind::Fresh => "fresh",
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CasualKind {
    /// Canned reply for small talk
    pub fn reply(&self) -> &'static str {
        match self {
            CasualKind::Greeting => {
                "Hello! I can help you find laptops, desktops, phones and accessories from \
                 StarTech and Daraz. Tell me what you're looking for and your budget."
            }
            CasualKind::Thanks => {
                "You're welcome! Let me know if you'd like to compare products or search for \
                 something else."
            }
            CasualKind::Farewell => "Goodbye! Come back any time you need help finding a product.",
        }
    }
}

/// Facts about a message the rules are evaluated against
#[derive(Debug)]
struct Signals {
    token_count: usize,
    casual: Option<CasualKind>,
    has_product_term: bool,
    has_history: bool,
    follow_up_phrase: bool,
    deictic_cue: bool,
}

impl Signals {
    fn of(message: &str, history: &[ConversationTurn]) -> Self {
        let normalized = vocabulary::normalize(message);
        let tokens = vocabulary::tokenize(message);
        Self {
            token_count: tokens.len(),
            casual: vocabulary::casual_kind(&normalized),
            has_product_term: vocabulary::has_product_term(&tokens),
            has_history: !history.is_empty(),
            follow_up_phrase: vocabulary::is_follow_up_phrase(&normalized),
            deictic_cue: vocabulary::has_deictic_cue(&tokens),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Casual,
    Contextual,
    Fresh,
}

struct Rule {
    name: &'static str,
    applies: fn(&Signals) -> bool,
    outcome: Outcome,
}

/// Rules in priority order. Anything unmatched is Fresh.
const RULES: &[Rule] = &[
    Rule {
        name: "product_term_overrides_casual",
        applies: |s| s.casual.is_some() && s.has_product_term,
        outcome: Outcome::Fresh,
    },
    Rule {
        name: "explicit_follow_up",
        applies: |s| s.has_history && s.follow_up_phrase,
        outcome: Outcome::Contextual,
    },
    Rule {
        name: "casual_phrase",
        applies: |s| s.casual.is_some(),
        outcome: Outcome::Casual,
    },
    Rule {
        name: "short_deictic_follow_up",
        applies: |s| {
            s.has_history
                && s.token_count <= SHORT_FOLLOW_UP_TOKENS
                && s.deictic_cue
                && !s.has_product_term
        },
        outcome: Outcome::Contextual,
    },
];

/// Message router
#[derive(Debug, Clone)]
pub struct ContextRouter {
    window: usize,
}

impl ContextRouter {
    /// `window` bounds how many recent turns are inspected for prior items
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    /// Classify a message. Total and side-effect free.
    pub fn route(&self, message: &str, history: &[ConversationTurn]) -> Route {
        let window = recent_window(history, self.window);
        let signals = Signals::of(message, window);

        let (rule, outcome) = RULES
            .iter()
            .find(|rule| (rule.applies)(&signals))
            .map(|rule| (rule.name, rule.outcome))
            .unwrap_or(("default", Outcome::Fresh));

        tracing::debug!(rule = rule, outcome = ?outcome, signals = ?signals, "Routed message");

        match outcome {
            Outcome::Fresh => Route::Fresh,
            Outcome::Casual => match signals.casual {
                Some(kind) => Route::Casual(kind),
                None => Route::Fresh,
            },
            Outcome::Contextual => match last_shown_items(window) {
                Some(items) => Route::Contextual {
                    prior_items: items.to_vec(),
                },
                None => {
                    tracing::debug!(rule = rule, "No prior items in window, treating as fresh");
                    Route::Fresh
                }
            },
        }
    }
}

/// Items of the most recent assistant turn that displayed any
fn last_shown_items(window: &[ConversationTurn]) -> Option<&[CatalogItem]> {
    window
        .iter()
        .rev()
        .filter(|turn| turn.role == Role::Assistant)
        .map(ConversationTurn::shown_items)
        .find(|items| !items.is_empty())
}

/// Intent hint for a contextual follow-up, inferred from its wording
pub fn follow_up_intent(message: &str) -> Intent {
    let normalized = vocabulary::normalize(message);
    let tokens = vocabulary::tokenize(message);
    let has = |words: &[&str]| tokens.iter().any(|t| words.contains(&t.as_str()));

    if has(&["compare", "comparison", "vs", "versus", "difference", "differences", "better", "both"])
        || normalized.contains("pros and cons")
    {
        Intent::new(ProductCount::Comparison, IntentAction::Compare)
    } else if vocabulary::has_ordinal_reference(&normalized)
        || normalized.contains("tell me more")
        || normalized.contains("more about")
        || has(&["details", "specs", "it"])
    {
        Intent::new(ProductCount::Single, IntentAction::Info)
    } else {
        Intent::new(ProductCount::Multiple, IntentAction::Recommend)
    }
}
