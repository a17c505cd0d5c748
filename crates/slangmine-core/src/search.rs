//! Search provider seam and result-page model.
//!
//! Providers return raw page payloads (the provider's JSON text) so the memo
//! can persist exactly what was fetched; [`SearchPage::parse`] turns a payload
//! into ranked items.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use crate::error::SearchError;
use crate::matching::{contains_tokens, tokens};

/// Results per provider page.
pub const PAGE_SIZE: u32 = 10;

/// A source of raw search-result pages.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Fetch the page of results starting at 1-based rank `start`.
    async fn fetch_page(&self, query: &str, start: u32) -> Result<String, SearchError>;
}

/// One ranked search result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: Option<String>,
}

/// A parsed page of search results.
#[derive(Debug, Clone)]
pub struct SearchPage {
    /// Provider's estimate of the total number of results for the query.
    pub total_results: u64,
    pub items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct RawPage {
    #[serde(rename = "searchInformation")]
    search_information: RawInfo,
    /// Omitted by the provider when a query has no results.
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct RawInfo {
    #[serde(rename = "totalResults", deserialize_with = "de_count")]
    total_results: u64,
}

/// `totalResults` arrives as a decimal string; accept plain numbers too.
fn de_count<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    match Count::deserialize(d)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl SearchPage {
    /// Parse a raw provider payload.
    pub fn parse(raw: &str) -> Result<Self, SearchError> {
        let page: RawPage =
            serde_json::from_str(raw).map_err(|e| SearchError::Malformed(e.to_string()))?;
        Ok(Self {
            total_results: page.search_information.total_results,
            items: page.items,
        })
    }

    /// 0-based index of the first item whose title or snippet mentions `term`.
    pub fn first_mention(&self, term: &str) -> Option<usize> {
        let needle = tokens(term);
        self.items.iter().position(|item| {
            contains_tokens(&tokens(&item.title), &needle)
                || item
                    .snippet
                    .as_deref()
                    .is_some_and(|s| contains_tokens(&tokens(s), &needle))
        })
    }
}

/// 1-based start offsets of the pages searched for a depth budget.
///
/// Pages start at 1, 11, 21, … and a page is searched when its start is
/// below `max_depth` (depth 10 → one page, depth 30 → three).
pub fn page_offsets(max_depth: u32) -> impl Iterator<Item = u32> {
    (1..max_depth).step_by(PAGE_SIZE as usize)
}

/// Start offset of the page holding 1-based `rank`.
pub fn page_of_rank(rank: u32) -> u32 {
    (rank.max(1) - 1) / PAGE_SIZE * PAGE_SIZE + 1
}

/// Whether a result at `rank` would be seen by a search bounded by `max_depth`.
pub fn rank_within_depth(rank: u32, max_depth: u32) -> bool {
    page_of_rank(rank) < max_depth
}
