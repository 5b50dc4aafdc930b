//! ConCommerce Context Engine
//!
//! Answers one chat message end to end:
//! - Route the message (casual, contextual follow-up, fresh search)
//! - Interpret, merge and budget-check search criteria
//! - Embed, retrieve and ground the reply on the candidates
//! - Resolve which candidates the reply actually discussed

pub mod exchange;
pub mod pipeline;

pub use exchange::{ChatRequest, ChatResponse, Notice, ResponseMetadata};
pub use pipeline::{ChatPipeline, PipelineComponents, PipelineSettings};
