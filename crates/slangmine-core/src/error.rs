use std::path::PathBuf;

use thiserror::Error;

/// Failure to build a [`Lexicon`](crate::Lexicon) from the reference table.
///
/// Every variant is fatal at load time.
#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("reading lexicon {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("malformed lexicon: missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("malformed lexicon at row {row}: {reason}")]
    Malformed { row: usize, reason: String },
}

/// The run was cancelled while waiting on the pacer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("run cancelled")]
pub struct Cancelled;

/// Failure of a search page lookup.
///
/// [`QuotaExceeded`](Self::QuotaExceeded) and [`Cancelled`](Self::Cancelled)
/// stop the whole run; every other variant only fails the current
/// (query, seed) decision, which stays retryable.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("search transport failed: {0}")]
    Transport(String),

    #[error("malformed search response: {0}")]
    Malformed(String),

    #[error("page at offset {offset} for '{query}' is not cached (offline mode)")]
    OfflineMiss { query: String, offset: u32 },

    #[error("search quota exhausted after {0} calls")]
    QuotaExceeded(u64),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl SearchError {
    /// Whether this error must halt the run rather than fail one verdict.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_) | Self::Cancelled(_))
    }
}
