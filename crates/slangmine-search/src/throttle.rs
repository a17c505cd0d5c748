//! Pacing and quota enforcement around any [`SearchProvider`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use slangmine_core::{Pacer, SearchError, SearchProvider};
use tracing::warn;

/// Ceiling on the number of provider calls in one run.
#[derive(Debug, Default)]
pub struct SearchBudget {
    used: AtomicU64,
    limit: Option<u64>,
}

impl SearchBudget {
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            used: AtomicU64::new(0),
            limit,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> Option<u64> {
        self.limit.map(|l| l.saturating_sub(self.used()))
    }

    /// Claim one call, failing once the ceiling is reached.
    pub fn spend(&self) -> Result<(), SearchError> {
        let Some(limit) = self.limit else {
            self.used.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        };
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < limit).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|n| {
                warn!(used = n, limit, "search budget exhausted");
                SearchError::QuotaExceeded(n)
            })
    }
}

/// A provider whose calls wait on a shared [`Pacer`] and draw on a
/// [`SearchBudget`].
pub struct Throttled<P> {
    inner: P,
    pacer: Arc<Pacer>,
    budget: Arc<SearchBudget>,
}

impl<P: SearchProvider> Throttled<P> {
    pub fn new(inner: P, pacer: Arc<Pacer>, budget: Arc<SearchBudget>) -> Self {
        Self {
            inner,
            pacer,
            budget,
        }
    }
}

#[async_trait]
impl<P: SearchProvider> SearchProvider for Throttled<P> {
    async fn fetch_page(&self, query: &str, start: u32) -> Result<String, SearchError> {
        if self.budget.remaining() == Some(0) {
            return Err(SearchError::QuotaExceeded(self.budget.used()));
        }
        self.pacer.wait().await?;
        self.budget.spend()?;
        self.inner.fetch_page(query, start).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchProvider for Counting {
        async fn fetch_page(&self, _: &str, _: u32) -> Result<String, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(r#"{"searchInformation": {"totalResults": "0"}}"#.into())
        }
    }

    #[test]
    fn budget_counts_and_stops() {
        let budget = SearchBudget::new(Some(2));
        budget.spend().unwrap();
        budget.spend().unwrap();
        assert!(matches!(budget.spend(), Err(SearchError::QuotaExceeded(2))));
        assert_eq!(budget.used(), 2);
        assert_eq!(budget.remaining(), Some(0));
    }

    #[test]
    fn unlimited_budget_only_counts() {
        let budget = SearchBudget::unlimited();
        for _ in 0..5 {
            budget.spend().unwrap();
        }
        assert_eq!(budget.used(), 5);
        assert_eq!(budget.remaining(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn calls_are_paced_and_budgeted() {
        let pacer = Arc::new(Pacer::new(
            Duration::from_millis(1500),
            CancellationToken::new(),
        ));
        let budget = Arc::new(SearchBudget::new(Some(3)));
        let provider = Throttled::new(Counting::default(), pacer, budget.clone());

        let start = Instant::now();
        for offset in [1, 11, 21] {
            provider.fetch_page("bars", offset).await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(3000));

        let err = provider.fetch_page("bars", 31).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 3);
        assert_eq!(budget.used(), 3);
    }

    #[tokio::test]
    async fn cancellation_is_fatal() {
        let token = CancellationToken::new();
        let pacer = Arc::new(Pacer::new(Duration::ZERO, token.clone()));
        let provider = Throttled::new(
            Counting::default(),
            pacer,
            Arc::new(SearchBudget::unlimited()),
        );
        token.cancel();
        let err = provider.fetch_page("bars", 1).await.unwrap_err();
        assert!(matches!(err, SearchError::Cancelled(_)));
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 0);
    }
}
