//! corpus-serve - HTTP API
//!
//! Axum-based HTTP surface for Corpus hybrid search, intelligent
//! autocomplete, feedback capture, and usage analytics.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Server configuration from environment variables
pub mod config;

/// API error types
pub mod error;

/// HTTP handlers for the search API
pub mod handlers;

/// Request and response types
pub mod responses;

/// Server instance management and the startup phase
pub mod server;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use server::CorpusServer;
