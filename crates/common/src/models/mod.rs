//! Domain models shared across the pipeline
//!
//! Catalog items are owned by the external index and carried by value.
//! Criteria and filters live for a single request.

mod conversation;
mod criteria;
mod filter;
mod item;
mod selector;

pub use conversation::{recent_window, ConversationTurn, Role};
pub use criteria::{Intent, IntentAction, ProductCount, SearchCriteria, SpecHints};
pub use filter::{FilterState, MergedFilter};
pub use item::{
    format_amount, CatalogItem, PriceRange, ScoredItem, Source, Specs, PRICE_CEILING,
    PRICE_SANITY_LIMIT,
};
pub use selector::{EmbeddingSpace, GenerationBackend};
