use slangmine_core::{Cancelled, SearchError};
use slangmine_store::StoreError;
use thiserror::Error;

/// Why a run stopped before finishing its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// The search call budget ran out after this many calls.
    QuotaExceeded(u64),
    Cancelled,
}

impl Halt {
    /// The halt a fatal search error implies, if it is fatal.
    pub fn from_search(e: &SearchError) -> Option<Self> {
        match e {
            SearchError::QuotaExceeded(n) => Some(Self::QuotaExceeded(*n)),
            SearchError::Cancelled(_) => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl From<Cancelled> for Halt {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl std::fmt::Display for Halt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaExceeded(n) => write!(f, "search quota exhausted after {n} calls"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}
