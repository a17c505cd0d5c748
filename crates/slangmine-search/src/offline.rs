use async_trait::async_trait;
use slangmine_core::{SearchError, SearchProvider};

/// Provider for memo-only replays: every page the memo does not already hold
/// is an error, so offline runs never touch the network.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineProvider;

#[async_trait]
impl SearchProvider for OfflineProvider {
    async fn fetch_page(&self, query: &str, start: u32) -> Result<String, SearchError> {
        Err(SearchError::OfflineMiss {
            query: query.to_string(),
            offset: start,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_fetch_misses() {
        let err = OfflineProvider.fetch_page("bars", 11).await.unwrap_err();
        assert!(matches!(err, SearchError::OfflineMiss { offset: 11, .. }));
        assert!(!err.is_fatal());
    }
}
