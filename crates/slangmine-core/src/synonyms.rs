//! Synonym lexicons derived from a finished run.
//!
//! The generated lexicon lists each seed's novel validated synonyms; the
//! labelled lexicon lists the manually confirmed ones, split into specific
//! and broad. Both are keyed by seed and carry the seed's DrugBank id.

use std::collections::{BTreeMap, BTreeSet};

use crate::aggregate::SeedSummary;
use crate::labels::{LabelSet, ManualLabel};
use crate::lexicon::Lexicon;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSynonyms {
    pub seed: String,
    pub dbid: Option<String>,
    pub widely_discussed: bool,
    /// Sorted, without duplicates.
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelledSynonyms {
    pub seed: String,
    pub dbid: Option<String>,
    pub specific: Vec<String>,
    pub broad: Vec<String>,
}

fn dbid(lexicon: &Lexicon, seed: &str) -> Option<String> {
    lexicon.entry(seed).and_then(|e| e.dbid.clone())
}

/// One entry per seed in `seeds`, in that order. Seeds without a summary
/// or without any validated synonym are kept with an empty list.
pub fn generated_synonyms(
    lexicon: &Lexicon,
    seeds: &[String],
    summaries: &[SeedSummary],
    discussed: &BTreeSet<String>,
) -> Vec<GeneratedSynonyms> {
    let by_seed: BTreeMap<&str, &SeedSummary> =
        summaries.iter().map(|s| (s.seed.as_str(), s)).collect();
    seeds
        .iter()
        .map(|seed| GeneratedSynonyms {
            seed: seed.clone(),
            dbid: dbid(lexicon, seed),
            widely_discussed: discussed.contains(seed),
            synonyms: by_seed
                .get(seed.as_str())
                .map(|s| s.novel_validated.keys().cloned().collect())
                .unwrap_or_default(),
        })
        .collect()
}

/// Positive manual labels grouped by seed, ordered by seed name.
pub fn labelled_synonyms(lexicon: &Lexicon, labels: &LabelSet) -> Vec<LabelledSynonyms> {
    let mut by_seed: BTreeMap<&str, (BTreeSet<&str>, BTreeSet<&str>)> = BTreeMap::new();
    for (seed, candidate, label) in labels.iter() {
        let (specific, broad) = by_seed.entry(seed).or_default();
        match label {
            ManualLabel::Specific => {
                specific.insert(candidate);
            }
            ManualLabel::Broad => {
                broad.insert(candidate);
            }
            ManualLabel::Rejected => {}
        }
    }

    by_seed
        .into_iter()
        .filter(|(_, (specific, broad))| !specific.is_empty() || !broad.is_empty())
        .map(|(seed, (specific, broad))| LabelledSynonyms {
            seed: seed.to_string(),
            dbid: dbid(lexicon, seed),
            specific: specific.into_iter().map(str::to_string).collect(),
            broad: broad.into_iter().map(str::to_string).collect(),
        })
        .collect()
}

/// Render a synonym list as single-quoted terms joined by commas, e.g.
/// `'xanny','zanbar'`.
pub fn format_synonyms(terms: &[String]) -> String {
    terms
        .iter()
        .map(|t| format!("'{t}'"))
        .collect::<Vec<_>>()
        .join(",")
}
