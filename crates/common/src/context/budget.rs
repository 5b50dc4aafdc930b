//! Budget-feasibility guard
//!
//! Answers "no complete product exists under this budget" before any
//! embedding or index call is made.

use super::vocabulary;
use crate::config::{BudgetConfig, RealismFloor};
use crate::models::{format_amount, MergedFilter};
use serde::{Deserialize, Serialize};

/// Suggestions are rounded up to this step
const SUGGESTION_STEP: u64 = 5_000;

/// Words that start a qualifier of the product being asked for
const QUALIFIERS: &[&str] = &[
    "with", "having", "has", "for", "under", "below", "within", "around", "upto", "that",
    "which", "including",
];

enum ProductClass<'a> {
    Accessory,
    Complete(&'a RealismFloor),
}

/// A budget below the realism floor of the requested product class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfeasibleBudget {
    /// Product class implied by the query ("laptop")
    pub class: String,
    /// Upper bound the user asked for
    pub requested_max: u64,
    /// Cheapest complete product of the class in the catalog
    pub floor: u64,
    /// Alternative budgets, ascending
    pub suggested_budgets: Vec<u64>,
}

/// Outcome of the guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feasibility {
    Feasible,
    Infeasible(InfeasibleBudget),
}

/// Checks merged price bounds against per-class realism floors
#[derive(Debug, Clone)]
pub struct BudgetGuard {
    floors: Vec<RealismFloor>,
    accessory_keywords: Vec<String>,
    currency: String,
}

impl BudgetGuard {
    pub fn new(config: &BudgetConfig) -> Self {
        Self {
            floors: config.floors.clone(),
            accessory_keywords: config.accessory_keywords.clone(),
            currency: config.currency.clone(),
        }
    }

    /// Decide whether a search for `query` under `filter` can succeed
    pub fn check(&self, query: &str, filter: &MergedFilter) -> Feasibility {
        if !filter.price.has_upper_bound() {
            return Feasibility::Feasible;
        }

        let tokens = vocabulary::tokenize(query);
        let floor = match self.head_class(&tokens) {
            Some(ProductClass::Complete(floor)) => floor,
            Some(ProductClass::Accessory) | None => return Feasibility::Feasible,
        };

        let requested_max = filter.price.max;
        if requested_max >= floor.floor {
            return Feasibility::Feasible;
        }

        tracing::info!(
            class = %floor.class,
            requested_max = requested_max,
            floor = floor.floor,
            "Budget below realism floor, skipping retrieval"
        );

        Feasibility::Infeasible(InfeasibleBudget {
            class: floor.class.clone(),
            requested_max,
            floor: floor.floor,
            suggested_budgets: suggestions(floor.floor),
        })
    }

    fn class_of(&self, token: &str) -> Option<ProductClass<'_>> {
        if vocabulary::matches_any(token, &self.accessory_keywords) {
            return Some(ProductClass::Accessory);
        }
        self.floors
            .iter()
            .find(|floor| vocabulary::matches_any(token, &floor.keywords))
            .map(ProductClass::Complete)
    }

    /// Class of the thing being shopped for. The head phrase runs up to the
    /// first qualifier, and its last class word wins ("laptop bag" is an
    /// accessory, "laptop with good battery" is a laptop).
    fn head_class(&self, tokens: &[String]) -> Option<ProductClass<'_>> {
        let head_len = tokens
            .iter()
            .position(|t| QUALIFIERS.contains(&t.as_str()))
            .unwrap_or(tokens.len());
        tokens[..head_len]
            .iter()
            .rev()
            .find_map(|t| self.class_of(t))
            .or_else(|| tokens.iter().find_map(|t| self.class_of(t)))
    }

    /// User-facing guidance for an infeasible budget
    pub fn guidance(&self, infeasible: &InfeasibleBudget) -> String {
        let options = infeasible
            .suggested_budgets
            .iter()
            .map(|amount| format!("- {} {}", format_amount(*amount), self.currency))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "A complete {class} under {max} {cur} isn't available in our catalog. \
             The most affordable {class}s start at around {floor} {cur}.\n\n\
             You could try one of these budgets instead:\n{options}\n\n\
             If you were looking for {class} accessories or parts, let me know and I'll search for those.",
            class = infeasible.class,
            max = format_amount(infeasible.requested_max),
            cur = self.currency,
            floor = format_amount(infeasible.floor),
            options = options,
        )
    }
}

fn round_up(amount: u64, step: u64) -> u64 {
    amount.div_ceil(step) * step
}

/// The floor itself, one and a half times it, and twice it
fn suggestions(floor: u64) -> Vec<u64> {
    let mut budgets = vec![
        round_up(floor, SUGGESTION_STEP),
        round_up(floor * 3 / 2, SUGGESTION_STEP),
        round_up(floor * 2, SUGGESTION_STEP),
    ];
    budgets.dedup();
    budgets
}
