//! Generation runs: prompt the model for every seed, validate each
//! candidate, and write the batch result table.
//!
//! Work is strictly sequential. The memo is flushed every
//! `checkpoint_every` validated candidates and once more at the end. When
//! the search budget runs out or the run is cancelled, nothing more is
//! generated or fetched; candidates already generated still get their
//! lexicon verdicts, with any pending search recorded as failed, and the
//! table is written so a later re-run can pick them up.

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use slangmine_ai::{GenerateError, Generator, PromptStyle, build_prompt, generate};
use slangmine_core::{Lexicon, ResultRow, SearchOutcome, SearchProvider, Verdict};
use slangmine_store::{SearchMemo, write_parquet};
use tracing::{info, warn};

use crate::PipelineError;
use crate::error::Halt;
use crate::validator::Validator;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub prompts_per_seed: u32,
    pub queries_per_prompt: u32,
    pub style: PromptStyle,
    /// Search depth budget per tier.
    pub max_depth: u32,
    /// Flush the memo after this many validated candidates.
    pub checkpoint_every: usize,
    /// Seed for example sampling; random when unset.
    pub rng_seed: Option<u64>,
    pub memo_path: PathBuf,
    pub results_path: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            prompts_per_seed: 1,
            queries_per_prompt: 1,
            style: PromptStyle::default(),
            max_depth: 10,
            checkpoint_every: 50,
            rng_seed: None,
            memo_path: PathBuf::from("search_memo.json"),
            results_path: PathBuf::from("results.parquet"),
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub rows: Vec<ResultRow>,
    /// Seeds that could not be prompted (unknown, or too few examples).
    pub skipped_seeds: Vec<String>,
    /// Completion lines dropped for not being list items.
    pub malformed_lines: usize,
    /// Completions abandoned after exhausting their attempts.
    pub failed_completions: usize,
    pub halted: Option<Halt>,
}

impl RunReport {
    /// Rows whose search still has to succeed.
    pub fn unresolved(&self) -> usize {
        self.rows.iter().filter(|r| r.verdict.needs_search()).count()
    }
}

/// Identifier for a new run, from the current UTC time.
pub fn new_run_id() -> String {
    chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string()
}

pub struct GenerationRun<'a> {
    lexicon: &'a Lexicon,
    generator: &'a dyn Generator,
    provider: &'a dyn SearchProvider,
    config: RunConfig,
}

impl<'a> GenerationRun<'a> {
    pub fn new(
        lexicon: &'a Lexicon,
        generator: &'a dyn Generator,
        provider: &'a dyn SearchProvider,
        config: RunConfig,
    ) -> Self {
        Self {
            lexicon,
            generator,
            provider,
            config,
        }
    }

    /// Run every seed, then flush `memo` and write the result table.
    pub async fn execute(
        &self,
        seeds: &[String],
        memo: &mut SearchMemo,
    ) -> Result<RunReport, PipelineError> {
        let run_id = new_run_id();
        let mut rng = match self.config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let validator = Validator::new(self.lexicon, self.provider, self.config.max_depth);
        let mut report = RunReport {
            run_id: run_id.clone(),
            rows: Vec::new(),
            skipped_seeds: Vec::new(),
            malformed_lines: 0,
            failed_completions: 0,
            halted: None,
        };
        let mut since_checkpoint = 0usize;

        info!(run_id = %run_id, seeds = seeds.len(), "generation run started");

        'seeds: for seed in seeds {
            let Some(entry) = self.lexicon.entry(seed) else {
                warn!(seed = %seed, "seed not in lexicon; skipping");
                report.skipped_seeds.push(seed.clone());
                continue;
            };
            let seed = entry.seed.as_str();
            let pool = self.lexicon.prompt_examples(seed);

            for prompt_index in 0..self.config.prompts_per_seed {
                let prompt = match build_prompt(seed, &pool, self.config.style, &mut rng) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(seed, error = %e, "cannot build prompt; skipping seed");
                        report.skipped_seeds.push(seed.to_string());
                        continue 'seeds;
                    }
                };

                for query_index in 0..self.config.queries_per_prompt {
                    let completion = match generate(self.generator, &prompt).await {
                        Ok(c) => c,
                        Err(GenerateError::Cancelled(c)) => {
                            report.halted = Some(c.into());
                            break 'seeds;
                        }
                        Err(e) => {
                            warn!(seed, prompt_index, query_index, error = %e, "completion failed");
                            report.failed_completions += 1;
                            continue;
                        }
                    };
                    report.malformed_lines += completion.malformed.len();

                    for candidate in completion.candidates {
                        let verdict = match report.halted {
                            Some(_) => pending(validator.lexical(&candidate, seed)),
                            None => match validator.validate(memo, &candidate, seed).await {
                                Ok(v) => v,
                                Err(e) => {
                                    warn!(error = %e, "stopping searches for this run");
                                    report.halted =
                                        Some(Halt::from_search(&e).unwrap_or(Halt::Cancelled));
                                    pending(validator.lexical(&candidate, seed))
                                }
                            },
                        };
                        report.rows.push(ResultRow {
                            run_id: run_id.clone(),
                            prompt_index,
                            query_index,
                            seed: seed.to_string(),
                            candidate,
                            verdict,
                        });

                        since_checkpoint += 1;
                        if since_checkpoint >= self.config.checkpoint_every {
                            memo.flush(&self.config.memo_path)?;
                            since_checkpoint = 0;
                        }
                    }

                    if report.halted.is_some() {
                        break 'seeds;
                    }
                }
            }
        }

        finish(memo, &self.config.memo_path, &self.config.results_path, &report.rows)?;
        info!(
            run_id = %run_id,
            rows = report.rows.len(),
            unresolved = report.unresolved(),
            halted = ?report.halted,
            "generation run finished"
        );
        Ok(report)
    }
}

/// Mark a lexically unresolved verdict as awaiting search.
pub(crate) fn pending(verdict: Verdict) -> Verdict {
    if verdict.lexically_resolved() {
        verdict
    } else {
        verdict.with_search(SearchOutcome::SearchFailed)
    }
}

pub(crate) fn finish(
    memo: &mut SearchMemo,
    memo_path: &Path,
    results_path: &Path,
    rows: &[ResultRow],
) -> Result<(), PipelineError> {
    memo.flush(memo_path)?;
    write_parquet(results_path, rows)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::tests::{FakeSearch, lexicon};
    use async_trait::async_trait;
    use slangmine_core::{Bucket, Pacer};
    use slangmine_search::{SearchBudget, Throttled};
    use slangmine_store::read_parquet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// Returns the same completion for every prompt.
    struct Scripted {
        text: &'static str,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(text: &'static str) -> Self {
            Self {
                text,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Generator for Scripted {
        async fn complete(&self, _: &str) -> Result<String, GenerateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.to_string())
        }
    }

    fn config(dir: &Path) -> RunConfig {
        RunConfig {
            rng_seed: Some(3),
            checkpoint_every: 2,
            memo_path: dir.join("memo.json"),
            results_path: dir.join("results.parquet"),
            ..RunConfig::default()
        }
    }

    const COMPLETION: &str = " xanny\n5. valium\n6. white xanax bars\n7. blue football\nsure, here you go";

    #[tokio::test]
    async fn runs_seed_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let lex = lexicon();
        let generator = Scripted::new(COMPLETION);
        let search = FakeSearch::default()
            .with_hit("blue football", 1, &["alprazolam blue football bars"]);
        let cfg = config(dir.path());
        let run = GenerationRun::new(&lex, &generator, &search, cfg.clone());
        let mut memo = SearchMemo::new();

        let report = run
            .execute(&["alprazolam".to_string()], &mut memo)
            .await
            .unwrap();

        let buckets: Vec<Bucket> = report.rows.iter().map(|r| r.verdict.bucket()).collect();
        assert_eq!(
            buckets,
            vec![
                Bucket::SameSeed,
                Bucket::OtherSeed,
                Bucket::Substring,
                Bucket::NovelCorroborated
            ]
        );
        assert_eq!(report.malformed_lines, 1);
        assert!(report.halted.is_none());
        assert_eq!(search.calls(), 1);

        assert_eq!(read_parquet(&cfg.results_path).unwrap(), report.rows);
        let reloaded = SearchMemo::load(&cfg.memo_path).unwrap();
        assert_eq!(reloaded.len(), 1);
    }

    #[tokio::test]
    async fn unknown_seed_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let lex = lexicon();
        let generator = Scripted::new(COMPLETION);
        let search = FakeSearch::default();
        let run = GenerationRun::new(&lex, &generator, &search, config(dir.path()));
        let mut memo = SearchMemo::new();

        let report = run
            .execute(&["lorazepam".to_string()], &mut memo)
            .await
            .unwrap();
        assert!(report.rows.is_empty());
        assert_eq!(report.skipped_seeds, vec!["lorazepam".to_string()]);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn seed_with_too_few_examples_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let lex = lexicon();
        let generator = Scripted::new(COMPLETION);
        let search = FakeSearch::default();
        let run = GenerationRun::new(&lex, &generator, &search, config(dir.path()));
        let mut memo = SearchMemo::new();

        // Exactly three usable examples.
        let report = run
            .execute(&["diazepam".to_string()], &mut memo)
            .await
            .unwrap();
        assert!(report.skipped_seeds.is_empty());

        let cfg = RunConfig {
            style: PromptStyle::WaysToSay,
            ..config(dir.path())
        };
        let sparse = Lexicon::from_entries(vec![slangmine_core::LexiconEntry {
            seed: "lorazepam".into(),
            dbid: None,
            groups: Vec::new(),
        }])
        .unwrap();
        let run = GenerationRun::new(&sparse, &generator, &search, cfg);
        let report = run
            .execute(&["lorazepam".to_string()], &mut memo)
            .await
            .unwrap();
        assert_eq!(report.skipped_seeds, vec!["lorazepam".to_string()]);
    }

    #[tokio::test]
    async fn quota_halt_marks_pending_rows_and_writes_table() {
        let dir = tempfile::tempdir().unwrap();
        let lex = lexicon();
        let generator = Scripted::new(" zanbar\n5. bicycle parts\n6. xanny\n7. footballs");
        let budget = Arc::new(SearchBudget::new(Some(2)));
        let provider = Throttled::new(
            FakeSearch::default(),
            Arc::new(Pacer::unpaced()),
            budget.clone(),
        );
        let cfg = config(dir.path());
        let run = GenerationRun::new(&lex, &generator, &provider, cfg.clone());
        let mut memo = SearchMemo::new();

        let report = run
            .execute(
                &["alprazolam".to_string(), "diazepam".to_string()],
                &mut memo,
            )
            .await
            .unwrap();

        assert_eq!(report.halted, Some(Halt::QuotaExceeded(2)));
        assert_eq!(budget.used(), 2);
        let outcomes: Vec<SearchOutcome> =
            report.rows.iter().map(|r| r.verdict.search_result).collect();
        assert_eq!(
            outcomes,
            vec![
                SearchOutcome::SearchFailed,
                SearchOutcome::SearchFailed,
                SearchOutcome::NotSearched,
                SearchOutcome::SearchFailed,
            ]
        );
        assert_eq!(report.unresolved(), 3);
        // Nothing was generated for the second seed.
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(read_parquet(&cfg.results_path).unwrap().len(), 4);
        // Pages fetched before the halt survive.
        assert_eq!(SearchMemo::load(&cfg.memo_path).unwrap().page_count(), 2);
    }

    #[tokio::test]
    async fn cancellation_before_generation() {
        let dir = tempfile::tempdir().unwrap();
        let lex = lexicon();
        let token = CancellationToken::new();
        let provider = Throttled::new(
            FakeSearch::default(),
            Arc::new(Pacer::new(Duration::ZERO, token.clone())),
            Arc::new(SearchBudget::unlimited()),
        );

        struct Cancelling;
        #[async_trait]
        impl Generator for Cancelling {
            async fn complete(&self, _: &str) -> Result<String, GenerateError> {
                Err(GenerateError::Cancelled(slangmine_core::Cancelled))
            }
        }

        token.cancel();
        let run = GenerationRun::new(&lex, &Cancelling, &provider, config(dir.path()));
        let mut memo = SearchMemo::new();
        let report = run
            .execute(&["alprazolam".to_string()], &mut memo)
            .await
            .unwrap();
        assert_eq!(report.halted, Some(Halt::Cancelled));
        assert!(report.rows.is_empty());
        assert!(dir.path().join("results.parquet").exists());
    }
}
