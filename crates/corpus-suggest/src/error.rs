// Autocomplete error taxonomy

use corpus_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the autocomplete engine.
///
/// Only the always-on direct-match source can fail a request; the
/// optional sources swallow their own failures and degrade to fewer
/// suggestions.
#[derive(Debug, Error)]
pub enum SuggestError {
    /// Content store failure on the direct-match path.
    #[error(transparent)]
    Store(#[from] StoreError),
}
