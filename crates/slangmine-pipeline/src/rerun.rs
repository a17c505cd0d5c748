//! Re-running searches over an existing result table.
//!
//! Lexicon verdicts are kept as they are; only `search_result` is
//! replaced. By default only rows that still need a search are revisited,
//! which is how a run halted by quota or cancellation is resumed.

use std::path::PathBuf;

use slangmine_core::ResultRow;
use slangmine_store::SearchMemo;
use tracing::{info, warn};

use crate::PipelineError;
use crate::error::Halt;
use crate::run::finish;
use crate::validator::Validator;

#[derive(Debug, Clone)]
pub struct RerunOptions {
    /// Revisit every row that reached the search stage, not only the
    /// unresolved ones.
    pub all: bool,
    pub checkpoint_every: usize,
    pub memo_path: PathBuf,
    pub results_path: PathBuf,
}

#[derive(Debug)]
pub struct RerunReport {
    pub rows: Vec<ResultRow>,
    /// Rows whose search was attempted.
    pub researched: usize,
    /// Rows whose search outcome differs from before.
    pub changed: usize,
    /// Rows left with a failed search.
    pub failed: usize,
    pub halted: Option<Halt>,
}

fn selected(row: &ResultRow, all: bool) -> bool {
    if all {
        !row.verdict.lexically_resolved()
    } else {
        row.verdict.needs_search()
    }
}

/// Search again for the selected rows of `rows`, then flush `memo` and
/// write the updated table.
pub async fn rerun_searches(
    validator: &Validator<'_>,
    memo: &mut SearchMemo,
    mut rows: Vec<ResultRow>,
    options: &RerunOptions,
) -> Result<RerunReport, PipelineError> {
    let pending = rows.iter().filter(|r| selected(r, options.all)).count();
    info!(rows = rows.len(), pending, all = options.all, "search re-run started");

    let mut researched = 0;
    let mut changed = 0;
    let mut halted = None;
    let mut since_checkpoint = 0usize;

    for row in rows.iter_mut().filter(|r| selected(r, options.all)) {
        let outcome = match validator
            .corroborate(memo, &row.candidate, &row.seed)
            .await
        {
            Ok(o) => o,
            Err(e) => {
                warn!(error = %e, "stopping search re-run");
                halted = Some(Halt::from_search(&e).unwrap_or(Halt::Cancelled));
                break;
            }
        };
        researched += 1;
        if outcome != row.verdict.search_result {
            changed += 1;
        }
        row.verdict.search_result = outcome;

        since_checkpoint += 1;
        if since_checkpoint >= options.checkpoint_every {
            memo.flush(&options.memo_path)?;
            since_checkpoint = 0;
        }
    }

    finish(memo, &options.memo_path, &options.results_path, &rows)?;
    let failed = rows.iter().filter(|r| r.verdict.needs_search()).count();
    info!(researched, changed, failed, halted = ?halted, "search re-run finished");

    Ok(RerunReport {
        rows,
        researched,
        changed,
        failed,
        halted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::pending;
    use crate::validator::tests::{FakeSearch, lexicon};
    use slangmine_core::{Bucket, Pacer, SearchOutcome, SearchTier};
    use slangmine_search::{SearchBudget, Throttled};
    use slangmine_store::read_parquet;
    use std::path::Path;
    use std::sync::Arc;

    fn row(validator: &Validator<'_>, seed: &str, candidate: &str) -> ResultRow {
        ResultRow {
            run_id: "20240101T000000Z".into(),
            prompt_index: 0,
            query_index: 0,
            seed: seed.into(),
            candidate: candidate.into(),
            verdict: pending(validator.lexical(candidate, seed)),
        }
    }

    fn options(dir: &Path, all: bool) -> RerunOptions {
        RerunOptions {
            all,
            checkpoint_every: 1,
            memo_path: dir.join("memo.json"),
            results_path: dir.join("rerun.parquet"),
        }
    }

    #[tokio::test]
    async fn resolves_failed_rows_only() {
        let dir = tempfile::tempdir().unwrap();
        let lex = lexicon();
        let search = FakeSearch::default().with_hit("zanbar", 1, &["zanbar alprazolam"]);
        let v = Validator::new(&lex, &search, 10);
        let mut settled = row(&v, "alprazolam", "bicycle_parts");
        settled.verdict.search_result = SearchOutcome::NotCorroborated;
        let rows = vec![
            row(&v, "alprazolam", "zanbar"),
            row(&v, "alprazolam", "xanny"),
            settled,
        ];
        let opts = options(dir.path(), false);
        let mut memo = SearchMemo::new();

        let report = rerun_searches(&v, &mut memo, rows, &opts).await.unwrap();

        assert_eq!(report.researched, 1);
        assert_eq!(report.changed, 1);
        assert_eq!(report.failed, 0);
        assert!(report.halted.is_none());
        assert_eq!(
            report.rows[0].verdict.search_result,
            SearchOutcome::Corroborated {
                tier: SearchTier::Plain,
                rank: 1
            }
        );
        assert_eq!(report.rows[1].verdict.bucket(), Bucket::SameSeed);
        assert_eq!(report.rows[2].verdict.bucket(), Bucket::NovelUncorroborated);
        assert_eq!(search.calls(), 1);
        assert_eq!(read_parquet(&opts.results_path).unwrap(), report.rows);
    }

    #[tokio::test]
    async fn all_revisits_settled_rows() {
        let dir = tempfile::tempdir().unwrap();
        let lex = lexicon();
        let search = FakeSearch::default().with_hit("bicycle parts drug", 1, &["alprazolam"]);
        let v = Validator::new(&lex, &search, 10);
        let mut settled = row(&v, "alprazolam", "bicycle_parts");
        settled.verdict.search_result = SearchOutcome::NotCorroborated;
        let mut memo = SearchMemo::new();

        let report = rerun_searches(&v, &mut memo, vec![settled], &options(dir.path(), true))
            .await
            .unwrap();
        assert_eq!(report.researched, 1);
        assert_eq!(report.changed, 1);
        assert_eq!(report.rows[0].verdict.search_result.tier(), Some(SearchTier::Drug));
    }

    #[tokio::test]
    async fn halts_on_quota_and_keeps_remaining_rows() {
        let dir = tempfile::tempdir().unwrap();
        let lex = lexicon();
        let provider = Throttled::new(
            FakeSearch::default(),
            Arc::new(Pacer::unpaced()),
            Arc::new(SearchBudget::new(Some(4))),
        );
        let v = Validator::new(&lex, &provider, 10);
        let rows = vec![
            row(&v, "alprazolam", "zanbar"),
            row(&v, "diazepam", "blue_dolphins"),
        ];
        let opts = options(dir.path(), false);
        let mut memo = SearchMemo::new();

        let report = rerun_searches(&v, &mut memo, rows, &opts).await.unwrap();
        assert_eq!(report.halted, Some(Halt::QuotaExceeded(4)));
        assert_eq!(report.researched, 1);
        assert_eq!(
            report.rows[0].verdict.search_result,
            SearchOutcome::NotCorroborated
        );
        assert_eq!(report.rows[1].verdict.search_result, SearchOutcome::SearchFailed);
        assert_eq!(report.failed, 1);
        assert_eq!(read_parquet(&opts.results_path).unwrap().len(), 2);
    }
}
