//! Validation verdicts and their classification buckets.

use std::fmt;
use std::str::FromStr;

use crate::lexicon::Lexicon;
use crate::term::normalize_query;

/// Query suffix tried when searching for corroboration, in tier order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SearchTier {
    Plain,
    Pill,
    Drug,
    Slang,
}

impl SearchTier {
    pub const ALL: [SearchTier; 4] = [Self::Plain, Self::Pill, Self::Drug, Self::Slang];

    /// Text appended to the candidate to build the tier's query.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Plain => "",
            Self::Pill => " pill",
            Self::Drug => " drug",
            Self::Slang => " slang",
        }
    }

    /// Search query for `candidate` at this tier.
    pub fn query_for(&self, candidate: &str) -> String {
        format!("{}{}", normalize_query(candidate), self.suffix())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Pill => "pill",
            Self::Drug => "drug",
            Self::Slang => "slang",
        }
    }
}

impl FromStr for SearchTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown search tier '{s}' (expected plain, pill, drug, slang)"))
    }
}

/// Result of the search stage for one (candidate, seed) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A lexicon stage decided the bucket; no search was needed.
    NotSearched,
    /// The seed appeared in results for the tier's query at 1-based `rank`.
    Corroborated { tier: SearchTier, rank: u32 },
    NotCorroborated,
    /// A fetch failed (or was never attempted because the run halted).
    /// Retryable; never read as "not corroborated".
    SearchFailed,
}

impl SearchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotSearched => "not_searched",
            Self::Corroborated { .. } => "corroborated",
            Self::NotCorroborated => "not_corroborated",
            Self::SearchFailed => "search_failed",
        }
    }

    pub fn tier(&self) -> Option<SearchTier> {
        match self {
            Self::Corroborated { tier, .. } => Some(*tier),
            _ => None,
        }
    }

    pub fn rank(&self) -> Option<u32> {
        match self {
            Self::Corroborated { rank, .. } => Some(*rank),
            _ => None,
        }
    }
}

/// Classification of a verdict. Exactly one applies to every verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    SameSeed,
    OtherSeed,
    Substring,
    NovelCorroborated,
    NovelUncorroborated,
    SearchError,
}

impl Bucket {
    pub const ALL: [Bucket; 6] = [
        Self::SameSeed,
        Self::OtherSeed,
        Self::Substring,
        Self::NovelCorroborated,
        Self::NovelUncorroborated,
        Self::SearchError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SameSeed => "same_seed",
            Self::OtherSeed => "other_seed",
            Self::Substring => "substring",
            Self::NovelCorroborated => "novel_corroborated",
            Self::NovelUncorroborated => "novel_uncorroborated",
            Self::SearchError => "search_error",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the in-memory lexicon stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalMatch {
    pub exact_seed_match: bool,
    pub owning_seed: Option<String>,
    pub substring_match: bool,
}

impl LexicalMatch {
    /// Run all three lexicon checks for `candidate` prompted by `seed`.
    pub fn classify(lexicon: &Lexicon, candidate: &str, seed: &str) -> Self {
        Self {
            exact_seed_match: lexicon.contains_variant(seed, candidate),
            owning_seed: lexicon.owning_seed(candidate).map(str::to_string),
            substring_match: lexicon.contains_known_term(candidate),
        }
    }
}

/// Validation verdict for one (candidate, seed) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Candidate is a known term of the prompting seed.
    pub exact_seed_match: bool,
    /// Seed owning the candidate when that is not the prompting seed.
    pub cross_seed_match: Option<String>,
    /// Some known term occurs token-aligned inside the candidate.
    pub substring_match: bool,
    pub search_result: SearchOutcome,
}

impl Verdict {
    pub fn new(lexical: LexicalMatch, seed: &str, search_result: SearchOutcome) -> Self {
        Self {
            exact_seed_match: lexical.exact_seed_match,
            cross_seed_match: lexical.owning_seed.filter(|owner| owner != seed),
            substring_match: lexical.substring_match,
            search_result,
        }
    }

    /// Whether the lexicon stages already decided the bucket.
    pub fn lexically_resolved(&self) -> bool {
        self.exact_seed_match || self.cross_seed_match.is_some() || self.substring_match
    }

    /// Whether the search stage still has to run (or be retried).
    pub fn needs_search(&self) -> bool {
        !self.lexically_resolved()
            && matches!(
                self.search_result,
                SearchOutcome::NotSearched | SearchOutcome::SearchFailed
            )
    }

    /// Replace the search stage result, keeping the lexicon stages.
    pub fn with_search(self, search_result: SearchOutcome) -> Self {
        Self {
            search_result,
            ..self
        }
    }

    /// The seed that lists the candidate, as recorded in the result table.
    pub fn owning_seed<'a>(&'a self, seed: &'a str) -> Option<&'a str> {
        self.cross_seed_match
            .as_deref()
            .or(self.exact_seed_match.then_some(seed))
    }

    pub fn bucket(&self) -> Bucket {
        if self.exact_seed_match {
            Bucket::SameSeed
        } else if self.cross_seed_match.is_some() {
            Bucket::OtherSeed
        } else if self.substring_match {
            Bucket::Substring
        } else {
            match self.search_result {
                SearchOutcome::Corroborated { .. } => Bucket::NovelCorroborated,
                SearchOutcome::NotCorroborated => Bucket::NovelUncorroborated,
                SearchOutcome::SearchFailed | SearchOutcome::NotSearched => Bucket::SearchError,
            }
        }
    }
}

/// One row of the batch result table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub run_id: String,
    pub prompt_index: u32,
    pub query_index: u32,
    pub seed: String,
    pub candidate: String,
    pub verdict: Verdict,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(exact: bool, cross: Option<&str>, substring: bool, search: SearchOutcome) -> Verdict {
        Verdict {
            exact_seed_match: exact,
            cross_seed_match: cross.map(str::to_string),
            substring_match: substring,
            search_result: search,
        }
    }

    #[test]
    fn every_combination_gets_exactly_one_bucket() {
        let outcomes = [
            SearchOutcome::NotSearched,
            SearchOutcome::Corroborated {
                tier: SearchTier::Pill,
                rank: 3,
            },
            SearchOutcome::NotCorroborated,
            SearchOutcome::SearchFailed,
        ];
        for exact in [false, true] {
            for cross in [None, Some("diazepam")] {
                for substring in [false, true] {
                    for search in outcomes {
                        let b = verdict(exact, cross, substring, search).bucket();
                        assert_eq!(Bucket::ALL.iter().filter(|x| **x == b).count(), 1);
                    }
                }
            }
        }
    }

    #[test]
    fn lexicon_stages_take_precedence() {
        let corroborated = SearchOutcome::Corroborated {
            tier: SearchTier::Plain,
            rank: 1,
        };
        assert_eq!(verdict(true, Some("x"), true, corroborated).bucket(), Bucket::SameSeed);
        assert_eq!(verdict(false, Some("x"), true, corroborated).bucket(), Bucket::OtherSeed);
        assert_eq!(verdict(false, None, true, corroborated).bucket(), Bucket::Substring);
        assert_eq!(
            verdict(false, None, false, corroborated).bucket(),
            Bucket::NovelCorroborated
        );
    }

    #[test]
    fn failed_or_missing_search_is_an_error_not_absence() {
        assert_eq!(
            verdict(false, None, false, SearchOutcome::SearchFailed).bucket(),
            Bucket::SearchError
        );
        assert_eq!(
            verdict(false, None, false, SearchOutcome::NotSearched).bucket(),
            Bucket::SearchError
        );
        assert_eq!(
            verdict(false, None, false, SearchOutcome::NotCorroborated).bucket(),
            Bucket::NovelUncorroborated
        );
    }

    #[test]
    fn revalidation_replaces_only_search() {
        let v = verdict(false, None, false, SearchOutcome::SearchFailed);
        assert!(v.needs_search());
        let v = v.with_search(SearchOutcome::Corroborated {
            tier: SearchTier::Drug,
            rank: 12,
        });
        assert!(!v.needs_search());
        assert_eq!(v.bucket(), Bucket::NovelCorroborated);
        assert!(!v.exact_seed_match);
    }

    #[test]
    fn cross_seed_excludes_own_seed() {
        let lexical = LexicalMatch {
            exact_seed_match: true,
            owning_seed: Some("alprazolam".into()),
            substring_match: true,
        };
        let v = Verdict::new(lexical, "alprazolam", SearchOutcome::NotSearched);
        assert_eq!(v.cross_seed_match, None);
        assert_eq!(v.owning_seed("alprazolam"), Some("alprazolam"));
    }

    #[test]
    fn tier_queries_and_names() {
        assert_eq!(SearchTier::Plain.query_for("blue_football"), "blue football");
        assert_eq!(SearchTier::Pill.query_for("blue_football"), "blue football pill");
        assert_eq!("drug".parse::<SearchTier>(), Ok(SearchTier::Drug));
        assert!("xyz".parse::<SearchTier>().is_err());
    }
}
