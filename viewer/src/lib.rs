//! Transcript viewer query layer
//!
//! Loads a transcript document, narrows it with [`filter::ConversationFilter`]
//! and summarizes the selection. Rendering is left to the front end, which
//! consumes the TypeScript bindings exported from `shared-types`.

pub mod filter;
pub mod loader;
pub mod stats;

pub use filter::{ended_by, ConversationFilter, EndedBy, Position, Scope};
pub use loader::{DocumentStore, ViewerError};
pub use stats::{
    export_selection, format_duration, global_sentiment, intent_facets, sentiment_breakdown,
    tool_facets, total_duration, SentimentShare,
};
