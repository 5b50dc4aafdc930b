//! Context Engine Core Components
//!
//! The pieces of the conversation-aware grounding pipeline:
//! - Message routing (casual, contextual follow-up, fresh search)
//! - Criteria interpretation and filter merging
//! - Budget feasibility
//! - Grounded synthesis and selection resolution

mod budget;
mod interpreter;
mod merger;
mod router;
mod synthesizer;
pub mod selection;
pub mod vocabulary;

pub use budget::{BudgetGuard, Feasibility, InfeasibleBudget};
pub use interpreter::{parse_criteria, CriteriaInterpreter, InterpreterConfig};
pub use merger::merge;
pub use router::{follow_up_intent, ContextRouter, Route, RouteKind, SHORT_FOLLOW_UP_TOKENS};
pub use selection::{Resolution, SelectionError};
pub use synthesizer::{
    intent_guidance, no_results_message, GroundingSynthesizer, SynthesisOptions,
};
pub use vocabulary::CasualKind;
