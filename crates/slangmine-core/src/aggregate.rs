//! Offline summaries over stored result rows.
//!
//! Everything here is a pure function of the rows, the lexicon's seed names
//! and (optionally) manual labels, so summaries can be recomputed with a
//! different depth cutoff, tier subset, frequency floor or label reading
//! without touching the network.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::labels::LabelSet;
use crate::lexicon::Lexicon;
use crate::verdict::{Bucket, ResultRow, SearchOutcome, SearchTier};

#[derive(Debug, Clone)]
pub struct SummaryOptions {
    /// Corroborations ranked deeper than this count as uncorroborated.
    pub depth_cutoff: Option<u32>,
    /// Tiers whose corroboration is accepted.
    pub tiers: BTreeSet<SearchTier>,
    /// Minimum number of times a candidate must be generated for its seed to
    /// be reported as a novel validated synonym.
    pub min_frequency: usize,
    /// Count broad (`?`) manual labels as positives.
    pub broad: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            depth_cutoff: None,
            tiers: SearchTier::ALL.into_iter().collect(),
            min_frequency: 1,
            broad: false,
        }
    }
}

impl SummaryOptions {
    /// Bucket of `row` after applying the depth cutoff and tier subset.
    pub fn effective_bucket(&self, row: &ResultRow) -> Bucket {
        match (row.verdict.bucket(), row.verdict.search_result) {
            (Bucket::NovelCorroborated, SearchOutcome::Corroborated { tier, rank }) => {
                let too_deep = self.depth_cutoff.is_some_and(|cutoff| rank > cutoff);
                if too_deep || !self.tiers.contains(&tier) {
                    Bucket::NovelUncorroborated
                } else {
                    Bucket::NovelCorroborated
                }
            }
            (bucket, _) => bucket,
        }
    }
}

/// The drug-name filter: a candidate that names a seed is excluded unless it
/// is the prompting seed itself.
pub fn passes_name_filter(lexicon: &Lexicon, seed: &str, candidate: &str) -> bool {
    candidate == seed || !lexicon.is_seed(candidate)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketCount {
    pub total: usize,
    pub unique: usize,
}

/// Novel-validated predictions scored against manual labels, over unique
/// labelled candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub true_positive: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_negative: usize,
    /// Unique candidates with no manual label.
    pub unlabelled: usize,
}

impl Confusion {
    pub fn precision(&self) -> Option<f64> {
        let predicted = self.true_positive + self.false_positive;
        (predicted > 0).then(|| self.true_positive as f64 / predicted as f64)
    }

    pub fn recall(&self) -> Option<f64> {
        let actual = self.true_positive + self.false_negative;
        (actual > 0).then(|| self.true_positive as f64 / actual as f64)
    }

    fn add(&mut self, other: &Confusion) {
        self.true_positive += other.true_positive;
        self.false_positive += other.false_positive;
        self.false_negative += other.false_negative;
        self.true_negative += other.true_negative;
        self.unlabelled += other.unlabelled;
    }
}

#[derive(Debug, Clone)]
pub struct SeedSummary {
    pub seed: String,
    pub total: usize,
    pub unique: usize,
    /// Every bucket is present, zero counts included.
    pub buckets: BTreeMap<Bucket, BucketCount>,
    /// Unique novel validated synonyms with their generation frequency.
    pub novel_validated: BTreeMap<String, usize>,
    pub confusion: Option<Confusion>,
}

impl SeedSummary {
    pub fn count(&self, bucket: Bucket) -> BucketCount {
        self.buckets.get(&bucket).copied().unwrap_or_default()
    }

    /// Whether any row still awaits a successful search.
    pub fn has_search_errors(&self) -> bool {
        self.count(Bucket::SearchError).total > 0
    }
}

/// Per-seed summaries, ordered by seed name.
pub fn summarize(
    rows: &[ResultRow],
    lexicon: &Lexicon,
    options: &SummaryOptions,
    labels: Option<&LabelSet>,
) -> Vec<SeedSummary> {
    let mut by_seed: BTreeMap<&str, Vec<&ResultRow>> = BTreeMap::new();
    for row in rows {
        by_seed.entry(row.seed.as_str()).or_default().push(row);
    }

    by_seed
        .into_iter()
        .map(|(seed, rows)| summarize_seed(seed, &rows, lexicon, options, labels))
        .collect()
}

fn summarize_seed(
    seed: &str,
    rows: &[&ResultRow],
    lexicon: &Lexicon,
    options: &SummaryOptions,
    labels: Option<&LabelSet>,
) -> SeedSummary {
    let mut frequency: HashMap<&str, usize> = HashMap::new();
    let mut bucket_totals: BTreeMap<Bucket, usize> = BTreeMap::new();
    let mut bucket_unique: BTreeMap<Bucket, BTreeSet<&str>> = BTreeMap::new();

    for row in rows {
        let bucket = options.effective_bucket(row);
        *frequency.entry(row.candidate.as_str()).or_default() += 1;
        *bucket_totals.entry(bucket).or_default() += 1;
        bucket_unique
            .entry(bucket)
            .or_default()
            .insert(row.candidate.as_str());
    }

    let buckets = Bucket::ALL
        .into_iter()
        .map(|b| {
            let count = BucketCount {
                total: bucket_totals.get(&b).copied().unwrap_or(0),
                unique: bucket_unique.get(&b).map_or(0, BTreeSet::len),
            };
            (b, count)
        })
        .collect();

    let novel_validated: BTreeMap<String, usize> = bucket_unique
        .get(&Bucket::NovelCorroborated)
        .into_iter()
        .flatten()
        .filter(|c| passes_name_filter(lexicon, seed, c))
        .filter_map(|c| {
            let n = frequency.get(c).copied().unwrap_or(0);
            (n >= options.min_frequency).then(|| (c.to_string(), n))
        })
        .collect();

    let confusion = labels.map(|labels| {
        let mut cm = Confusion::default();
        for candidate in frequency.keys() {
            let Some(label) = labels.get(seed, candidate) else {
                cm.unlabelled += 1;
                continue;
            };
            let predicted = novel_validated.contains_key(*candidate);
            match (predicted, label.is_positive(options.broad)) {
                (true, true) => cm.true_positive += 1,
                (true, false) => cm.false_positive += 1,
                (false, true) => cm.false_negative += 1,
                (false, false) => cm.true_negative += 1,
            }
        }
        cm
    });

    SeedSummary {
        seed: seed.to_string(),
        total: rows.len(),
        unique: frequency.len(),
        buckets,
        novel_validated,
        confusion,
    }
}

/// Cross-seed overview of a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOverview {
    /// Seeds with rows and no outstanding search errors.
    pub analysed: usize,
    /// Requested seeds that produced no rows at all.
    pub blank: Vec<String>,
    /// Seeds left out because some rows still need a successful search.
    pub with_errors: Vec<String>,
    pub mean_total: f64,
    pub mean_unique: f64,
    pub mean_novel_validated: f64,
    /// Summed confusion counts over analysed seeds, when labels were given.
    pub confusion: Option<Confusion>,
}

/// Overview across `seeds`, using the per-seed `summaries`.
pub fn overview(seeds: &[String], summaries: &[SeedSummary]) -> BatchOverview {
    let by_seed: HashMap<&str, &SeedSummary> =
        summaries.iter().map(|s| (s.seed.as_str(), s)).collect();

    let mut out = BatchOverview::default();
    let (mut total, mut unique, mut novel) = (0usize, 0usize, 0usize);

    for seed in seeds {
        match by_seed.get(seed.as_str()) {
            None => out.blank.push(seed.clone()),
            Some(s) if s.total == 0 => out.blank.push(seed.clone()),
            Some(s) if s.has_search_errors() => out.with_errors.push(seed.clone()),
            Some(s) => {
                out.analysed += 1;
                total += s.total;
                unique += s.unique;
                novel += s.novel_validated.len();
                if let Some(cm) = &s.confusion {
                    out.confusion.get_or_insert_with(Confusion::default).add(cm);
                }
            }
        }
    }

    if out.analysed > 0 {
        let n = out.analysed as f64;
        out.mean_total = total as f64 / n;
        out.mean_unique = unique as f64 / n;
        out.mean_novel_validated = novel as f64 / n;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::ManualLabel;
    use crate::lexicon::{LexiconEntry, VariantGroup, VariantKind};
    use crate::verdict::Verdict;

    fn lexicon() -> Lexicon {
        let entry = |seed: &str, known: &[&str]| LexiconEntry {
            seed: seed.to_string(),
            dbid: None,
            groups: vec![VariantGroup {
                kind: VariantKind::Known,
                terms: known.iter().map(|s| s.to_string()).collect(),
            }],
        };
        Lexicon::from_entries(vec![
            entry("alprazolam", &["xanax", "xanax_bars"]),
            entry("diazepam", &["valium"]),
        ])
        .unwrap()
    }

    fn row(seed: &str, candidate: &str, verdict: Verdict) -> ResultRow {
        ResultRow {
            run_id: "r1".into(),
            prompt_index: 0,
            query_index: 0,
            seed: seed.into(),
            candidate: candidate.into(),
            verdict,
        }
    }

    fn novel(search: SearchOutcome) -> Verdict {
        Verdict {
            exact_seed_match: false,
            cross_seed_match: None,
            substring_match: false,
            search_result: search,
        }
    }

    fn corroborated(tier: SearchTier, rank: u32) -> Verdict {
        novel(SearchOutcome::Corroborated { tier, rank })
    }

    fn same_seed() -> Verdict {
        Verdict {
            exact_seed_match: true,
            cross_seed_match: None,
            substring_match: true,
            search_result: SearchOutcome::NotSearched,
        }
    }

    fn batch() -> Vec<ResultRow> {
        vec![
            row("alprazolam", "xanax", same_seed()),
            row("alprazolam", "xanax", same_seed()),
            row("alprazolam", "blue_football", corroborated(SearchTier::Plain, 2)),
            row("alprazolam", "blue_football", corroborated(SearchTier::Plain, 2)),
            row("alprazolam", "zanbar", corroborated(SearchTier::Slang, 25)),
            row("alprazolam", "quux", novel(SearchOutcome::NotCorroborated)),
            row("alprazolam", "diazepam", corroborated(SearchTier::Plain, 1)),
            row("alprazolam", "alprazolam", corroborated(SearchTier::Plain, 1)),
        ]
    }

    #[test]
    fn counts_raw_and_unique_per_bucket() {
        let summaries = summarize(&batch(), &lexicon(), &SummaryOptions::default(), None);
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.total, 8);
        assert_eq!(s.unique, 6);
        assert_eq!(s.count(Bucket::SameSeed), BucketCount { total: 2, unique: 1 });
        assert_eq!(
            s.count(Bucket::NovelCorroborated),
            BucketCount { total: 5, unique: 4 }
        );
        assert_eq!(s.count(Bucket::SearchError), BucketCount::default());
        assert_eq!(s.buckets.len(), Bucket::ALL.len());
    }

    #[test]
    fn name_filter_keeps_own_seed_only() {
        let lex = lexicon();
        assert!(passes_name_filter(&lex, "alprazolam", "alprazolam"));
        assert!(!passes_name_filter(&lex, "alprazolam", "diazepam"));
        assert!(passes_name_filter(&lex, "alprazolam", "blue_football"));

        let s = &summarize(&batch(), &lex, &SummaryOptions::default(), None)[0];
        let names: Vec<&str> = s.novel_validated.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["alprazolam", "blue_football", "zanbar"]);
        assert_eq!(s.novel_validated["blue_football"], 2);
    }

    #[test]
    fn depth_cutoff_and_tiers_recompute_offline() {
        let lex = lexicon();
        let shallow = SummaryOptions {
            depth_cutoff: Some(10),
            ..SummaryOptions::default()
        };
        let s = &summarize(&batch(), &lex, &shallow, None)[0];
        assert!(!s.novel_validated.contains_key("zanbar"));
        assert_eq!(s.count(Bucket::NovelUncorroborated).unique, 2);

        let plain_only = SummaryOptions {
            tiers: [SearchTier::Plain].into_iter().collect(),
            ..SummaryOptions::default()
        };
        let s = &summarize(&batch(), &lex, &plain_only, None)[0];
        assert!(!s.novel_validated.contains_key("zanbar"));
        assert!(s.novel_validated.contains_key("blue_football"));
    }

    #[test]
    fn frequency_floor() {
        let opts = SummaryOptions {
            min_frequency: 2,
            ..SummaryOptions::default()
        };
        let s = &summarize(&batch(), &lexicon(), &opts, None)[0];
        assert_eq!(s.novel_validated.len(), 1);
        assert!(s.novel_validated.contains_key("blue_football"));
    }

    #[test]
    fn confusion_against_manual_labels() {
        let mut labels = LabelSet::default();
        labels.insert("alprazolam", "blue_football", ManualLabel::Specific);
        labels.insert("alprazolam", "zanbar", ManualLabel::Rejected);
        labels.insert("alprazolam", "quux", ManualLabel::Broad);
        labels.insert("alprazolam", "xanax", ManualLabel::Specific);

        let lex = lexicon();
        let strict = &summarize(&batch(), &lex, &SummaryOptions::default(), Some(&labels))[0];
        let cm = strict.confusion.unwrap();
        assert_eq!(cm.true_positive, 1);
        assert_eq!(cm.false_positive, 1);
        assert_eq!(cm.false_negative, 1);
        assert_eq!(cm.true_negative, 1);
        assert_eq!(cm.unlabelled, 2);
        assert_eq!(cm.precision(), Some(0.5));

        let broad = SummaryOptions {
            broad: true,
            ..SummaryOptions::default()
        };
        let relaxed = &summarize(&batch(), &lex, &broad, Some(&labels))[0];
        assert_eq!(relaxed.confusion.unwrap().false_negative, 2);
    }

    #[test]
    fn overview_skips_blank_and_errored_seeds() {
        let mut rows = batch();
        rows.push(row("diazepam", "vals", novel(SearchOutcome::SearchFailed)));
        let summaries = summarize(&rows, &lexicon(), &SummaryOptions::default(), None);
        let seeds = vec![
            "alprazolam".to_string(),
            "diazepam".to_string(),
            "lorazepam".to_string(),
        ];
        let o = overview(&seeds, &summaries);
        assert_eq!(o.analysed, 1);
        assert_eq!(o.blank, vec!["lorazepam".to_string()]);
        assert_eq!(o.with_errors, vec!["diazepam".to_string()]);
        assert_eq!(o.mean_total, 8.0);
        assert_eq!(o.mean_novel_validated, 3.0);
        assert!(o.confusion.is_none());
    }
}
