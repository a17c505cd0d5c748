//! In-memory index over the reference lexicon of known drug names.
//!
//! One [`LexiconEntry`] per seed term, in file row order. Each entry holds
//! several variant groups (misspellings, pill marks, web-derived variants,
//! slang); the seed name itself also counts as a known term of its entry.
//!
//! Seed ownership of a token is resolved first-row-wins: when a token is
//! (erroneously) listed under several seeds, the earliest row owns it, so
//! repeated runs always agree.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use arrow::record_batch::RecordBatch;
use tracing::{debug, info, warn};

use crate::error::LexiconError;
use crate::matching::{contains_tokens, tokens};
use crate::table::{find_ragged_row, get_string, read_tsv};
use crate::term::normalize_term;

/// Column holding the canonical seed name.
pub const SEED_COLUMN: &str = "drug";

/// Optional column holding the seed's DrugBank identifier.
pub const DBID_COLUMN: &str = "dbid";

/// Placeholder meaning "no terms in this group".
const EMPTY_MARKER: &str = "-";

/// Category of known alternate names for a seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    Known,
    Phonetic,
    EditOne,
    EditTwo,
    PillMark,
    WebMisspelling,
    WebTitle,
    WebSnippet,
    UrbanSlang,
}

impl VariantKind {
    pub const ALL: [VariantKind; 9] = [
        Self::Known,
        Self::Phonetic,
        Self::EditOne,
        Self::EditTwo,
        Self::PillMark,
        Self::WebMisspelling,
        Self::WebTitle,
        Self::WebSnippet,
        Self::UrbanSlang,
    ];

    /// Column name in the reference table.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Known => "known",
            Self::Phonetic => "misspellingPhon",
            Self::EditOne => "edOne",
            Self::EditTwo => "edTwo",
            Self::PillMark => "pillMark",
            Self::WebMisspelling => "google_ms",
            Self::WebTitle => "google_title",
            Self::WebSnippet => "google_snippet",
            Self::UrbanSlang => "ud_slang",
        }
    }

    /// Whether a missing column fails the load.
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Known)
    }
}

/// An unordered set of known tokens of one [`VariantKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantGroup {
    pub kind: VariantKind,
    pub terms: BTreeSet<String>,
}

/// One row of the reference table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconEntry {
    pub seed: String,
    /// DrugBank identifier, when the table has one.
    pub dbid: Option<String>,
    pub groups: Vec<VariantGroup>,
}

impl LexiconEntry {
    /// All known terms of this entry, the seed name first.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.seed.as_str()).chain(
            self.groups
                .iter()
                .flat_map(|g| g.terms.iter().map(String::as_str)),
        )
    }

    /// Whether a term-form token is the seed itself or one of its variants.
    pub fn contains(&self, token: &str) -> bool {
        self.seed == token || self.groups.iter().any(|g| g.terms.contains(token))
    }

    fn group(&self, kind: VariantKind) -> Option<&VariantGroup> {
        self.groups.iter().find(|g| g.kind == kind)
    }
}

/// Queryable, immutable lexicon.
pub struct Lexicon {
    entries: Vec<LexiconEntry>,
    by_seed: HashMap<String, usize>,
    /// term → index of the first entry (row order) containing it.
    owners: HashMap<String, usize>,
    /// Distinct token sequences of every known term, for substring checks.
    known_terms: Vec<Vec<String>>,
}

impl Lexicon {
    /// Build the index from entries in table row order.
    ///
    /// Fails on an empty or duplicated seed name.
    pub fn from_entries(entries: Vec<LexiconEntry>) -> Result<Self, LexiconError> {
        let mut by_seed = HashMap::with_capacity(entries.len());
        let mut owners: HashMap<String, usize> = HashMap::new();
        let mut distinct: BTreeSet<Vec<String>> = BTreeSet::new();
        let mut shared = 0usize;

        for (idx, entry) in entries.iter().enumerate() {
            if entry.seed.is_empty() {
                return Err(LexiconError::Malformed {
                    row: idx,
                    reason: "empty seed name".into(),
                });
            }
            if by_seed.insert(entry.seed.clone(), idx).is_some() {
                return Err(LexiconError::Malformed {
                    row: idx,
                    reason: format!("duplicate seed name '{}'", entry.seed),
                });
            }

            for term in entry.terms() {
                match owners.get(term) {
                    Some(&owner) if owner != idx => shared += 1,
                    Some(_) => {}
                    None => {
                        owners.insert(term.to_string(), idx);
                    }
                }
                let toks = tokens(term);
                if !toks.is_empty() {
                    distinct.insert(toks);
                }
            }
        }

        if shared > 0 {
            warn!(
                shared,
                "lexicon lists some terms under more than one seed; first row wins"
            );
        }

        Ok(Self {
            entries,
            by_seed,
            owners,
            known_terms: distinct.into_iter().collect(),
        })
    }

    /// Build the index from reference-table batches.
    ///
    /// Expects a `drug` column and a `known` column; the other variant
    /// columns are optional. Variant fields are comma-joined lists where
    /// `-` or an empty cell means "none".
    pub fn from_batches(batches: &[RecordBatch]) -> Result<Self, LexiconError> {
        let mut entries = Vec::new();
        let mut row_base = 0usize;

        for batch in batches {
            let seed_col = batch
                .column_by_name(SEED_COLUMN)
                .ok_or(LexiconError::MissingColumn(SEED_COLUMN))?;
            let dbid_col = batch.column_by_name(DBID_COLUMN);

            let mut variant_cols = Vec::with_capacity(VariantKind::ALL.len());
            for kind in VariantKind::ALL {
                match batch.column_by_name(kind.column()) {
                    Some(col) => variant_cols.push((kind, col)),
                    None if kind.is_required() => {
                        return Err(LexiconError::MissingColumn(kind.column()));
                    }
                    None => debug!(column = kind.column(), "optional lexicon column absent"),
                }
            }

            for row in 0..batch.num_rows() {
                let row_no = row_base + row;
                let seed = get_string(seed_col.as_ref(), row)
                    .map(|s| normalize_term(&s))
                    .unwrap_or_default();

                let mut groups = Vec::with_capacity(variant_cols.len());
                for (kind, col) in &variant_cols {
                    let terms = match get_string(col.as_ref(), row) {
                        Some(field) => split_variants(&field).map_err(|reason| {
                            LexiconError::Malformed {
                                row: row_no,
                                reason: format!("column '{}': {reason}", kind.column()),
                            }
                        })?,
                        None => BTreeSet::new(),
                    };
                    groups.push(VariantGroup { kind: *kind, terms });
                }

                let dbid = dbid_col
                    .and_then(|col| get_string(col.as_ref(), row))
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty() && s != EMPTY_MARKER);

                entries.push(LexiconEntry { seed, dbid, groups });
            }
            row_base += batch.num_rows();
        }

        Self::from_entries(entries)
    }

    /// Load the tab-separated reference table from disk.
    pub fn load_tsv(path: &Path) -> Result<Self, LexiconError> {
        let bytes = std::fs::read(path).map_err(|source| LexiconError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(ragged) = find_ragged_row(&bytes) {
            return Err(LexiconError::Malformed {
                row: ragged.row,
                reason: format!(
                    "expected {} tab-separated fields, found {}",
                    ragged.expected, ragged.found
                ),
            });
        }
        let batches = read_tsv(&bytes)?;
        if batches.is_empty() {
            return Err(LexiconError::MissingColumn(SEED_COLUMN));
        }
        let lexicon = Self::from_batches(&batches)?;
        info!(
            path = %path.display(),
            seeds = lexicon.len(),
            terms = lexicon.owners.len(),
            "loaded lexicon"
        );
        Ok(lexicon)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in table row order.
    pub fn entries(&self) -> &[LexiconEntry] {
        &self.entries
    }

    pub fn entry(&self, seed: &str) -> Option<&LexiconEntry> {
        self.by_seed
            .get(&normalize_term(seed))
            .map(|&idx| &self.entries[idx])
    }

    /// Whether `name` is the canonical name of some seed.
    pub fn is_seed(&self, name: &str) -> bool {
        self.by_seed.contains_key(&normalize_term(name))
    }

    /// Whether `token` is a known term of `seed`.
    pub fn contains_variant(&self, seed: &str, token: &str) -> bool {
        self.entry(seed)
            .is_some_and(|e| e.contains(&normalize_term(token)))
    }

    /// The first seed (in row order) that lists `token` as a known term.
    pub fn owning_seed(&self, token: &str) -> Option<&str> {
        self.owners
            .get(&normalize_term(token))
            .map(|&idx| self.entries[idx].seed.as_str())
    }

    /// Whether any known term of any seed occurs token-aligned in `candidate`.
    pub fn contains_known_term(&self, candidate: &str) -> bool {
        let haystack = tokens(candidate);
        self.known_terms
            .iter()
            .any(|term| contains_tokens(&haystack, term))
    }

    /// Example pool for prompts about `seed`.
    ///
    /// Single-word `known` names plus every phonetic, edit-distance and
    /// pill-mark variant. Empty when the seed is unknown.
    pub fn prompt_examples(&self, seed: &str) -> Vec<String> {
        let Some(entry) = self.entry(seed) else {
            return Vec::new();
        };

        let mut pool = BTreeSet::new();
        if let Some(known) = entry.group(VariantKind::Known) {
            pool.extend(
                known
                    .terms
                    .iter()
                    .filter(|t| !t.contains(crate::term::SEPARATOR))
                    .cloned(),
            );
        }
        for kind in [
            VariantKind::Phonetic,
            VariantKind::EditOne,
            VariantKind::EditTwo,
            VariantKind::PillMark,
        ] {
            if let Some(group) = entry.group(kind) {
                pool.extend(group.terms.iter().cloned());
            }
        }
        pool.into_iter().collect()
    }
}

/// Split one comma-joined variant field into term-form tokens.
fn split_variants(field: &str) -> Result<BTreeSet<String>, String> {
    let field = field.trim();
    if field.is_empty() || field == EMPTY_MARKER {
        return Ok(BTreeSet::new());
    }

    let mut terms = BTreeSet::new();
    for (pos, item) in field.split(',').enumerate() {
        let item = item.trim().trim_matches('\'');
        if item.is_empty() {
            return Err(format!("empty item at position {pos} in '{field}'"));
        }
        if item == EMPTY_MARKER {
            continue;
        }
        terms.insert(normalize_term(item));
    }
    Ok(terms)
}
