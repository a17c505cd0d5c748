//! Validation of one candidate against one seed.
//!
//! The lexicon stages (same seed, other seed, token-aligned substring) are
//! pure lookups and are always recorded. Only when none of them holds does
//! the candidate go to search, tier by tier, through the memo.

use slangmine_core::{
    LexicalMatch, Lexicon, SearchError, SearchOutcome, SearchProvider, SearchTier, Verdict,
};
use slangmine_store::SearchMemo;
use tracing::{debug, warn};

pub struct Validator<'a> {
    lexicon: &'a Lexicon,
    provider: &'a dyn SearchProvider,
    max_depth: u32,
}

impl<'a> Validator<'a> {
    pub fn new(lexicon: &'a Lexicon, provider: &'a dyn SearchProvider, max_depth: u32) -> Self {
        Self {
            lexicon,
            provider,
            max_depth,
        }
    }

    /// Verdict from the lexicon stages alone, with search not yet run.
    pub fn lexical(&self, candidate: &str, seed: &str) -> Verdict {
        let lexical = LexicalMatch::classify(self.lexicon, candidate, seed);
        Verdict::new(lexical, seed, SearchOutcome::NotSearched)
    }

    /// Full verdict for `candidate` prompted by `seed`.
    ///
    /// Returns `Err` only for errors that must stop the run (quota,
    /// cancellation); any other search failure becomes
    /// [`SearchOutcome::SearchFailed`].
    pub async fn validate(
        &self,
        memo: &mut SearchMemo,
        candidate: &str,
        seed: &str,
    ) -> Result<Verdict, SearchError> {
        let verdict = self.lexical(candidate, seed);
        if verdict.lexically_resolved() {
            return Ok(verdict);
        }
        let outcome = self.corroborate(memo, candidate, seed).await?;
        Ok(verdict.with_search(outcome))
    }

    /// Try each search tier in order, stopping at the first corroboration.
    ///
    /// A failed tier ends the search: later tiers are not attempted.
    pub async fn corroborate(
        &self,
        memo: &mut SearchMemo,
        candidate: &str,
        seed: &str,
    ) -> Result<SearchOutcome, SearchError> {
        for tier in SearchTier::ALL {
            let query = tier.query_for(candidate);
            match memo
                .lookup_or_fetch(self.provider, &query, seed, self.max_depth)
                .await
            {
                Ok(lookup) => {
                    if let (true, Some(rank)) = (lookup.corroborated, lookup.rank) {
                        debug!(candidate, seed, tier = tier.as_str(), rank, "corroborated");
                        return Ok(SearchOutcome::Corroborated { tier, rank });
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(candidate, seed, query = %query, error = %e, "search failed");
                    return Ok(SearchOutcome::SearchFailed);
                }
            }
        }
        Ok(SearchOutcome::NotCorroborated)
    }
}
