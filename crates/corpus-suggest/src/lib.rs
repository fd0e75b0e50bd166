//! corpus-suggest - Intelligent Autocomplete
//!
//! Four-source autocomplete (direct title matches, semantic similarity,
//! caller history, trending queries) with a TTL response cache and a
//! background sweep task.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// TTL response cache and its sweep task.
pub mod cache;
/// The prioritized four-source engine.
pub mod engine;
/// Autocomplete error taxonomy.
pub mod error;
/// Suggestion and option types.
pub mod types;

pub use cache::{CachedSuggestions, SuggestionCache, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL};
pub use engine::AutocompleteEngine;
pub use error::SuggestError;
pub use types::{AutocompleteOutcome, SuggestOptions, Suggestion, SuggestionSource};
