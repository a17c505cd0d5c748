//! Persistent memo of search corroboration decisions and raw result pages.
//!
//! Two typed maps back the memo:
//! - decisions keyed by (normalized query, seed)
//! - raw page payloads keyed by (normalized query, 1-based page offset)
//!
//! A decision with a rank is terminal: it is never overwritten, and a
//! shallower lookup reports it as not corroborated without touching it.
//! Pages go from absent to cached, never back (unless a cached payload no
//! longer parses, in which case it is evicted and refetched).
//!
//! The whole memo lives in memory and is written as a fresh JSON snapshot at
//! checkpoints:
//!
//! ```json
//! { "<query>": {
//!     "seeds": { "<seed>": { "result": true, "depth": 3 } },
//!     "pages": { "google_search_response_1": { ... provider payload ... } }
//! } }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use slangmine_core::search::{PAGE_SIZE, page_offsets, rank_within_depth};
use slangmine_core::{SearchError, SearchPage, SearchProvider, normalize_query};
use tracing::{debug, info, warn};

use crate::StoreError;
use crate::atomic::write_atomically;

const PAGE_KEY_PREFIX: &str = "google_search_response_";

/// Decision recorded for one (query, seed) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    /// 1-based rank of the first result mentioning the seed, once found.
    pub rank: Option<u32>,
    /// Deepest budget this pair has been searched with.
    pub searched_depth: u32,
}

impl CacheEntry {
    pub fn corroborated(&self) -> bool {
        self.rank.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        self.rank.is_some()
    }
}

/// Answer to a memo lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    pub corroborated: bool,
    pub rank: Option<u32>,
    /// Whether any page had to be requested from the provider.
    pub fetched: bool,
}

impl Lookup {
    fn not_found(fetched: bool) -> Self {
        Self {
            corroborated: false,
            rank: None,
            fetched,
        }
    }
}

#[derive(Debug, Default)]
pub struct SearchMemo {
    entries: HashMap<(String, String), CacheEntry>,
    pages: HashMap<(String, u32), String>,
    dirty: bool,
}

impl SearchMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Whether there are changes not yet written by [`flush`](Self::flush).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn entry(&self, query: &str, seed: &str) -> Option<CacheEntry> {
        self.entries
            .get(&(normalize_query(query), seed.to_string()))
            .copied()
    }

    pub fn has_page(&self, query: &str, offset: u32) -> bool {
        self.pages.contains_key(&(normalize_query(query), offset))
    }

    /// Decide whether `seed` appears in the top `max_depth` results for
    /// `query`, using cached decisions and pages before asking `provider`.
    ///
    /// On error nothing half-decided is kept: pages fetched before the
    /// failure stay cached, but the (query, seed) decision is dropped so the
    /// pair is retried later.
    pub async fn lookup_or_fetch(
        &mut self,
        provider: &dyn SearchProvider,
        query: &str,
        seed: &str,
        max_depth: u32,
    ) -> Result<Lookup, SearchError> {
        let query = normalize_query(query);
        let key = (query, seed.to_string());

        if let Some(entry) = self.entries.get(&key) {
            match entry.rank {
                Some(rank) => {
                    let within = rank_within_depth(rank, max_depth);
                    return Ok(Lookup {
                        corroborated: within,
                        rank: within.then_some(rank),
                        fetched: false,
                    });
                }
                None if entry.searched_depth >= max_depth => {
                    return Ok(Lookup::not_found(false));
                }
                None => {}
            }
        }

        match self.search(provider, &key.0, seed, max_depth).await {
            Ok(lookup) => {
                debug!(
                    query = %key.0,
                    seed,
                    corroborated = lookup.corroborated,
                    rank = ?lookup.rank,
                    fetched = lookup.fetched,
                    "search decision"
                );
                self.entries.insert(
                    key,
                    CacheEntry {
                        rank: lookup.rank,
                        searched_depth: max_depth,
                    },
                );
                self.dirty = true;
                Ok(lookup)
            }
            Err(e) => {
                if self.entries.remove(&key).is_some() {
                    self.dirty = true;
                }
                Err(e)
            }
        }
    }

    async fn search(
        &mut self,
        provider: &dyn SearchProvider,
        query: &str,
        seed: &str,
        max_depth: u32,
    ) -> Result<Lookup, SearchError> {
        let mut fetched = false;

        for offset in page_offsets(max_depth) {
            let page_key = (query.to_string(), offset);
            let cached = match self.pages.get(&page_key) {
                Some(raw) => match SearchPage::parse(raw) {
                    Ok(page) => Some(page),
                    Err(e) => {
                        warn!(query, offset, error = %e, "evicting unreadable cached page");
                        self.pages.remove(&page_key);
                        self.dirty = true;
                        None
                    }
                },
                None => None,
            };

            let page = match cached {
                Some(page) => page,
                None => {
                    let raw = provider.fetch_page(query, offset).await?;
                    fetched = true;
                    let page = SearchPage::parse(&raw)?;
                    self.pages.insert(page_key, raw);
                    self.dirty = true;
                    page
                }
            };

            if let Some(idx) = page.first_mention(seed) {
                let rank = offset + idx as u32;
                return Ok(Lookup {
                    corroborated: true,
                    rank: Some(rank),
                    fetched,
                });
            }

            let next = offset + PAGE_SIZE;
            if page.items.is_empty() || page.total_results < u64::from(next) {
                break;
            }
        }

        Ok(Lookup::not_found(fetched))
    }

    /// Union `other` into this memo.
    ///
    /// Terminal decisions are never overwritten; conflicting terminal ranks
    /// keep the existing one. Returns the number of conflicts.
    pub fn merge(&mut self, other: SearchMemo) -> usize {
        let mut conflicts = 0;

        for (key, theirs) in other.entries {
            match self.entries.get_mut(&key) {
                None => {
                    self.entries.insert(key, theirs);
                    self.dirty = true;
                }
                Some(ours) if ours.is_terminal() => {
                    if theirs.is_terminal() && theirs.rank != ours.rank {
                        warn!(
                            query = %key.0,
                            seed = %key.1,
                            kept = ?ours.rank,
                            dropped = ?theirs.rank,
                            "conflicting memo ranks; keeping existing"
                        );
                        conflicts += 1;
                    }
                }
                Some(ours) => {
                    if theirs.is_terminal() {
                        *ours = theirs;
                        self.dirty = true;
                    } else if theirs.searched_depth > ours.searched_depth {
                        ours.searched_depth = theirs.searched_depth;
                        self.dirty = true;
                    }
                }
            }
        }

        for (key, raw) in other.pages {
            if let std::collections::hash_map::Entry::Vacant(slot) = self.pages.entry(key) {
                slot.insert(raw);
                self.dirty = true;
            }
        }

        conflicts
    }

    /// Load a snapshot; a missing file is an empty memo.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            info!(path = %path.display(), "no memo snapshot; starting empty");
            return Ok(Self::new());
        }
        let bytes = std::fs::read(path).map_err(|e| StoreError::io(path, e))?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        let memo = Self::from_snapshot(snapshot);
        info!(
            path = %path.display(),
            entries = memo.len(),
            pages = memo.page_count(),
            "loaded search memo"
        );
        Ok(memo)
    }

    /// Write a full snapshot to `path`, replacing it atomically.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = self.to_snapshot();
        write_atomically(path, |mut tmp| {
            serde_json::to_writer(&mut tmp, &snapshot)?;
            Ok(tmp)
        })?;
        debug!(path = %path.display(), entries = self.len(), "memo snapshot written");
        Ok(())
    }

    /// [`save`](Self::save) if anything changed since the last flush.
    pub fn flush(&mut self, path: &Path) -> Result<bool, StoreError> {
        if !self.dirty {
            return Ok(false);
        }
        self.save(path)?;
        self.dirty = false;
        Ok(true)
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut memo = Self::new();
        for (query, record) in snapshot {
            let query = normalize_query(&query);
            for (seed, stored) in record.seeds {
                let rank = match (stored.result, u32::try_from(stored.depth)) {
                    (true, Ok(rank)) if rank > 0 => Some(rank),
                    (true, _) => {
                        warn!(query = %query, seed = %seed, depth = stored.depth, "corroborated entry without rank; ignoring");
                        continue;
                    }
                    (false, _) => None,
                };
                let entry = CacheEntry {
                    rank,
                    searched_depth: stored.searched.unwrap_or(0),
                };
                memo.entries.insert((query.clone(), seed), entry);
            }
            for (name, payload) in record.pages {
                let Some(offset) = name
                    .strip_prefix(PAGE_KEY_PREFIX)
                    .and_then(|n| n.parse::<u32>().ok())
                else {
                    warn!(query = %query, key = %name, "unrecognised page key; skipping");
                    continue;
                };
                let raw = match payload {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                memo.pages.insert((query.clone(), offset), raw);
            }
        }
        memo
    }

    fn to_snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for ((query, seed), entry) in &self.entries {
            snapshot.entry(query.clone()).or_default().seeds.insert(
                seed.clone(),
                StoredEntry {
                    result: entry.corroborated(),
                    depth: entry.rank.map_or(-1, i64::from),
                    searched: Some(entry.searched_depth),
                },
            );
        }
        for ((query, offset), raw) in &self.pages {
            let payload =
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
            snapshot
                .entry(query.clone())
                .or_default()
                .pages
                .insert(format!("{PAGE_KEY_PREFIX}{offset}"), payload);
        }
        snapshot
    }
}

type Snapshot = BTreeMap<String, QueryRecord>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueryRecord {
    #[serde(default)]
    seeds: BTreeMap<String, StoredEntry>,
    #[serde(default)]
    pages: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    result: bool,
    /// Rank when corroborated, -1 otherwise.
    depth: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    searched: Option<u32>,
}
