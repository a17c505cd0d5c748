//! Manual labels for judging generated candidates.
//!
//! Labels come from a hand-annotated tab-separated file with columns
//! `seed`, `candidate`, `label`, where label is `True` (refers to the seed
//! specifically), `?` (broad: refers to the seed and related drugs, e.g.
//! "benzo") or `False`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use arrow::record_batch::RecordBatch;
use tracing::{info, warn};

use crate::table::{get_string, read_tsv};
use crate::term::normalize_term;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManualLabel {
    Specific,
    Broad,
    Rejected,
}

impl ManualLabel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "True" | "true" => Some(Self::Specific),
            "?" => Some(Self::Broad),
            "False" | "false" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Whether the label counts as a real synonym. Broad labels count only
    /// under the relaxed reading.
    pub fn is_positive(&self, broad: bool) -> bool {
        match self {
            Self::Specific => true,
            Self::Broad => broad,
            Self::Rejected => false,
        }
    }
}

/// Manual labels keyed by (seed, candidate).
#[derive(Debug, Default)]
pub struct LabelSet {
    labels: HashMap<(String, String), ManualLabel>,
}

impl LabelSet {
    /// Build a LabelSet from Arrow batches.
    ///
    /// Expects columns: `seed`, `candidate`, `label`. Rows with an unknown
    /// label are skipped with a warning; later rows override earlier ones.
    pub fn from_batches(batches: &[RecordBatch]) -> anyhow::Result<Self> {
        let mut labels = HashMap::new();
        let mut skipped = 0usize;

        for batch in batches {
            let seed_col = batch
                .column_by_name("seed")
                .ok_or_else(|| anyhow::anyhow!("missing 'seed' column"))?;
            let cand_col = batch
                .column_by_name("candidate")
                .ok_or_else(|| anyhow::anyhow!("missing 'candidate' column"))?;
            let label_col = batch
                .column_by_name("label")
                .ok_or_else(|| anyhow::anyhow!("missing 'label' column"))?;

            for row in 0..batch.num_rows() {
                let (Some(seed), Some(candidate)) = (
                    get_string(seed_col.as_ref(), row),
                    get_string(cand_col.as_ref(), row),
                ) else {
                    skipped += 1;
                    continue;
                };
                let raw = get_string(label_col.as_ref(), row).unwrap_or_default();
                match ManualLabel::parse(&raw) {
                    Some(label) => {
                        labels.insert((normalize_term(&seed), normalize_term(&candidate)), label);
                    }
                    None => {
                        warn!(seed = %seed, candidate = %candidate, label = %raw, "unknown manual label");
                        skipped += 1;
                    }
                }
            }
        }

        info!(labels = labels.len(), skipped, "manual labels loaded");
        Ok(Self { labels })
    }

    pub fn load_tsv(path: &Path) -> anyhow::Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading labels {}", path.display()))?;
        let batches = read_tsv(&bytes).with_context(|| format!("parsing {}", path.display()))?;
        Self::from_batches(&batches)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, seed: &str, candidate: &str) -> Option<ManualLabel> {
        self.labels
            .get(&(seed.to_string(), candidate.to_string()))
            .copied()
    }

    /// Every label as (seed, candidate, label), in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, ManualLabel)> {
        self.labels
            .iter()
            .map(|((seed, candidate), label)| (seed.as_str(), candidate.as_str(), *label))
    }

    pub fn insert(&mut self, seed: &str, candidate: &str, label: ManualLabel) {
        self.labels
            .insert((normalize_term(seed), normalize_term(candidate)), label);
    }
}
