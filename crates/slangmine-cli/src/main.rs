mod display;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use slangmine_ai::{CompletionsClient, PromptStyle, SamplingParams};
use slangmine_core::aggregate::{overview, summarize};
use slangmine_core::synonyms::{generated_synonyms, labelled_synonyms};
use slangmine_core::{LabelSet, Lexicon, Pacer, ResultRow, SearchProvider, SearchTier, SummaryOptions};
use slangmine_pipeline::{GenerationRun, RerunOptions, RunConfig, Validator, rerun_searches};
use slangmine_search::{GoogleSearch, OfflineProvider, SearchBudget, Throttled};
use slangmine_store::{
    SearchMemo, read_parquet, write_csv, write_generated_lexicon, write_labelled_lexicon,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "slangmine", version, about = "Mine and validate slang synonyms for drug names")]
struct Cli {
    /// Reference lexicon (tab-separated, one row per seed drug)
    #[arg(long, env = "SLANGMINE_LEXICON", default_value = "data/drug_variants.tsv")]
    lexicon: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate candidates for seeds and validate them
    Run(RunArgs),
    /// Re-run the search stage over a stored result table
    Rerun(RerunArgs),
    /// Summarise stored result tables per seed, offline
    Summarize(SummarizeArgs),
    /// Classify ad-hoc candidates for one seed from the lexicon and memo
    Classify(ClassifyArgs),
    /// Write the generated (and optionally the manually labelled) synonym lexicon
    ExportLexicon(ExportLexiconArgs),
}

#[derive(Args)]
struct SearchArgs {
    /// Search memo snapshot (created if missing)
    #[arg(long, default_value = "data/search_memo.json")]
    memo: PathBuf,
    /// Other memo snapshots to merge in before starting
    #[arg(long = "merge-memo")]
    merge_memo: Vec<PathBuf>,
    /// Result depth searched per tier
    #[arg(long, default_value_t = 10)]
    depth: u32,
    /// Minimum delay between search calls, in milliseconds
    #[arg(long, default_value_t = 1500)]
    search_delay_ms: u64,
    /// Ceiling on search calls for this invocation (0 = unlimited)
    #[arg(long, default_value_t = 10_000)]
    budget: u64,
    /// Replay the memo only; pages it lacks count as failed searches
    #[arg(long)]
    offline: bool,
    /// Flush the memo after this many candidates
    #[arg(long, default_value_t = 50)]
    checkpoint_every: usize,
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,
    #[arg(long, env = "SEARCH_ENG_ID")]
    search_engine_id: Option<String>,
    /// Alternative search endpoint (Custom Search JSON API compatible)
    #[arg(long, env = "SEARCH_ENDPOINT")]
    search_endpoint: Option<String>,
}

#[derive(Args)]
struct RunArgs {
    /// Seeds to prompt for (default: every lexicon seed)
    seeds: Vec<String>,
    /// File with one seed per line, added to the positional seeds
    #[arg(long)]
    seeds_file: Option<PathBuf>,
    /// Distinct prompts (example samples) per seed
    #[arg(long, default_value_t = 1)]
    prompts: u32,
    /// Completions requested per prompt
    #[arg(long, default_value_t = 1)]
    queries: u32,
    /// Prompt layout: ways-to-say or counterexamples
    #[arg(long, default_value_t = PromptStyle::WaysToSay)]
    style: PromptStyle,
    /// Seed for example sampling, for reproducible prompts
    #[arg(long)]
    rng_seed: Option<u64>,
    /// Where to write the result table
    #[arg(long, short, default_value = "data/results.parquet")]
    output: PathBuf,

    #[arg(long, default_value = "gpt-3.5-turbo-instruct")]
    model: String,
    #[arg(long, default_value_t = 0.5)]
    temperature: f32,
    #[arg(long, default_value_t = 2048)]
    max_tokens: u32,
    #[arg(long, default_value_t = 0.0)]
    frequency_penalty: f32,
    #[arg(long, default_value_t = 0.0)]
    presence_penalty: f32,
    /// Attempts per completion before giving up on it
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,
    /// Minimum delay between completion calls, in milliseconds
    #[arg(long, default_value_t = 1500)]
    completion_delay_ms: u64,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,
    #[arg(long, env = "OPENAI_BASE_URL", default_value = slangmine_ai::generator::DEFAULT_BASE_URL)]
    openai_base_url: String,

    #[command(flatten)]
    search: SearchArgs,
}

#[derive(Args)]
struct RerunArgs {
    /// Result table to revisit
    input: PathBuf,
    /// Where to write the updated table (default: overwrite the input)
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// Re-search every novel row, not only unresolved ones
    #[arg(long)]
    all: bool,

    #[command(flatten)]
    search: SearchArgs,
}

/// Which rows to analyse and how to read them.
#[derive(Args)]
struct AnalysisArgs {
    /// Result tables to analyse together
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Restrict to these seeds (default: every lexicon seed)
    #[arg(long, value_delimiter = ',')]
    seeds: Vec<String>,
    /// File with one seed per line, added to --seeds
    #[arg(long)]
    seeds_file: Option<PathBuf>,
    /// Ignore corroborations ranked deeper than this
    #[arg(long)]
    depth_cutoff: Option<u32>,
    /// Accepted search tiers (default: all)
    #[arg(long, value_delimiter = ',')]
    tiers: Vec<SearchTier>,
    /// Minimum generation count for a novel validated synonym
    #[arg(long, default_value_t = 1)]
    min_frequency: usize,
    /// Manual labels (seed, candidate, label) for precision and recall
    #[arg(long)]
    labels: Option<PathBuf>,
    /// Count broad (?) labels as positives
    #[arg(long)]
    broad: bool,
}

impl AnalysisArgs {
    fn options(&self) -> SummaryOptions {
        let mut options = SummaryOptions {
            depth_cutoff: self.depth_cutoff,
            min_frequency: self.min_frequency,
            broad: self.broad,
            ..SummaryOptions::default()
        };
        if !self.tiers.is_empty() {
            options.tiers = self.tiers.iter().copied().collect();
        }
        options
    }
}

#[derive(Args)]
struct SummarizeArgs {
    #[command(flatten)]
    analysis: AnalysisArgs,
    /// Print the per-seed cards, not only the overview
    #[arg(long)]
    cards: bool,
    /// Also export the combined rows as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(Args)]
struct ClassifyArgs {
    seed: String,
    #[arg(required = true)]
    candidates: Vec<String>,
    /// Search memo to consult for novel candidates
    #[arg(long, default_value = "data/search_memo.json")]
    memo: PathBuf,
    #[arg(long, default_value_t = 10)]
    depth: u32,
}

#[derive(Args)]
struct ExportLexiconArgs {
    #[command(flatten)]
    analysis: AnalysisArgs,
    /// Where to write the generated lexicon
    #[arg(long, default_value = "lexicon/drugs_of_abuse_lexicon.tsv")]
    generated: PathBuf,
    /// Seeds (one per line) to flag as widely discussed
    #[arg(long)]
    discussed: Option<PathBuf>,
    /// Where to write the labelled lexicon (only with --labels)
    #[arg(long, default_value = "lexicon/manual_label_lexicon.tsv")]
    manual: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!("slangmine v{}", env!("CARGO_PKG_VERSION"));

    let lexicon = Lexicon::load_tsv(&cli.lexicon)
        .with_context(|| format!("failed to load lexicon {}", cli.lexicon.display()))?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; finishing current step and saving");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Run(args) => cmd_run(&lexicon, args, cancel).await,
        Command::Rerun(args) => cmd_rerun(&lexicon, args, cancel).await,
        Command::Summarize(args) => cmd_summarize(&lexicon, args),
        Command::Classify(args) => cmd_classify(&lexicon, args).await,
        Command::ExportLexicon(args) => cmd_export_lexicon(&lexicon, args),
    }
}

// ── run ──

async fn cmd_run(lexicon: &Lexicon, args: RunArgs, cancel: CancellationToken) -> anyhow::Result<()> {
    let mut seeds = args.seeds.clone();
    if let Some(path) = &args.seeds_file {
        seeds.extend(read_seed_file(path)?);
    }
    if seeds.is_empty() {
        seeds = lexicon.entries().iter().map(|e| e.seed.clone()).collect();
    }

    let api_key = args
        .openai_api_key
        .clone()
        .context("OPENAI_API_KEY is not set")?;
    let params = SamplingParams {
        model: args.model.clone(),
        temperature: args.temperature,
        max_tokens: args.max_tokens,
        frequency_penalty: args.frequency_penalty,
        presence_penalty: args.presence_penalty,
    };
    let generator = CompletionsClient::new(
        args.openai_base_url.clone(),
        api_key,
        params,
        Arc::new(Pacer::new(
            Duration::from_millis(args.completion_delay_ms),
            cancel.clone(),
        )),
        args.max_attempts,
    );

    let (provider, budget) = search_provider(&args.search, cancel)?;
    let mut memo = load_memo(&args.search)?;

    let config = RunConfig {
        prompts_per_seed: args.prompts,
        queries_per_prompt: args.queries,
        style: args.style,
        max_depth: args.search.depth,
        checkpoint_every: args.search.checkpoint_every,
        rng_seed: args.rng_seed,
        memo_path: args.search.memo.clone(),
        results_path: args.output.clone(),
    };
    let run = GenerationRun::new(lexicon, &generator, provider.as_ref(), config);
    let report = run.execute(&seeds, &mut memo).await?;

    println!("run {}", report.run_id);
    println!("  {:<26} {}", "seeds", seeds.len());
    println!("  {:<26} {}", "rows", report.rows.len());
    println!("  {:<26} {}", "unresolved searches", report.unresolved());
    println!("  {:<26} {}", "malformed lines", report.malformed_lines);
    println!("  {:<26} {}", "failed completions", report.failed_completions);
    println!("  {:<26} {}", "search calls", budget.used());
    if !report.skipped_seeds.is_empty() {
        println!("  {:<26} {}", "skipped seeds", report.skipped_seeds.join(", "));
    }
    println!("  {:<26} {}", "written to", args.output.display());
    if let Some(halt) = report.halted {
        println!("halted: {halt}; resume with `slangmine rerun {}`", args.output.display());
    }
    Ok(())
}

fn read_seed_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    Ok(text
        .lines()
        .map(slangmine_core::normalize_term)
        .filter(|s| !s.is_empty())
        .collect())
}

// ── rerun ──

async fn cmd_rerun(
    lexicon: &Lexicon,
    args: RerunArgs,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let rows = read_parquet(&args.input)
        .with_context(|| format!("failed to read result table {}", args.input.display()))?;
    let (provider, budget) = search_provider(&args.search, cancel)?;
    let mut memo = load_memo(&args.search)?;

    let output = args.output.clone().unwrap_or_else(|| args.input.clone());
    let options = RerunOptions {
        all: args.all,
        checkpoint_every: args.search.checkpoint_every,
        memo_path: args.search.memo.clone(),
        results_path: output.clone(),
    };
    let validator = Validator::new(lexicon, provider.as_ref(), args.search.depth);
    let report = rerun_searches(&validator, &mut memo, rows, &options).await?;

    println!("rerun of {}", args.input.display());
    println!("  {:<26} {}", "rows", report.rows.len());
    println!("  {:<26} {}", "re-searched", report.researched);
    println!("  {:<26} {}", "changed", report.changed);
    println!("  {:<26} {}", "still unresolved", report.failed);
    println!("  {:<26} {}", "search calls", budget.used());
    println!("  {:<26} {}", "written to", output.display());
    if let Some(halt) = report.halted {
        println!("halted: {halt}");
    }
    Ok(())
}

// ── summarize ──

/// Rows, seed selection and labels shared by the offline commands.
struct Analysis {
    rows: Vec<ResultRow>,
    seeds: Vec<String>,
    labels: Option<LabelSet>,
}

fn load_analysis(lexicon: &Lexicon, args: &AnalysisArgs) -> anyhow::Result<Analysis> {
    let mut rows: Vec<ResultRow> = Vec::new();
    for path in &args.inputs {
        let table = read_parquet(path)
            .with_context(|| format!("failed to read result table {}", path.display()))?;
        info!(path = %path.display(), rows = table.len(), "loaded result table");
        rows.extend(table);
    }

    let mut seeds: Vec<String> = args
        .seeds
        .iter()
        .map(|s| slangmine_core::normalize_term(s))
        .collect();
    if let Some(path) = &args.seeds_file {
        seeds.extend(read_seed_file(path)?);
    }
    if seeds.is_empty() {
        seeds = lexicon.entries().iter().map(|e| e.seed.clone()).collect();
    }
    let wanted: BTreeSet<&str> = seeds.iter().map(String::as_str).collect();
    rows.retain(|r| wanted.contains(r.seed.as_str()));

    let labels = match &args.labels {
        Some(path) => Some(
            LabelSet::load_tsv(path)
                .with_context(|| format!("failed to load labels {}", path.display()))?,
        ),
        None => None,
    };

    Ok(Analysis {
        rows,
        seeds,
        labels,
    })
}

fn cmd_summarize(lexicon: &Lexicon, args: SummarizeArgs) -> anyhow::Result<()> {
    let Analysis {
        rows,
        seeds,
        labels,
    } = load_analysis(lexicon, &args.analysis)?;

    let summaries = summarize(&rows, lexicon, &args.analysis.options(), labels.as_ref());
    if args.cards {
        for summary in &summaries {
            display::print_seed_card(summary);
        }
    }
    display::print_overview(&overview(&seeds, &summaries));

    if let Some(path) = &args.csv {
        write_csv(path, &rows)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), rows = rows.len(), "exported rows");
    }
    Ok(())
}

// ── export-lexicon ──

fn cmd_export_lexicon(lexicon: &Lexicon, args: ExportLexiconArgs) -> anyhow::Result<()> {
    let Analysis {
        rows,
        seeds,
        labels,
    } = load_analysis(lexicon, &args.analysis)?;
    let discussed: BTreeSet<String> = match &args.discussed {
        Some(path) => read_seed_file(path)?.into_iter().collect(),
        None => BTreeSet::new(),
    };

    let summaries = summarize(&rows, lexicon, &args.analysis.options(), None);
    let generated = generated_synonyms(lexicon, &seeds, &summaries, &discussed);
    write_generated_lexicon(&args.generated, &generated)
        .with_context(|| format!("failed to write {}", args.generated.display()))?;
    println!("  {:<26} {}", "generated lexicon", args.generated.display());

    if let Some(labels) = &labels {
        let labelled = labelled_synonyms(lexicon, labels);
        write_labelled_lexicon(&args.manual, &labelled)
            .with_context(|| format!("failed to write {}", args.manual.display()))?;
        println!("  {:<26} {}", "labelled lexicon", args.manual.display());
    }
    Ok(())
}

// ── classify ──

async fn cmd_classify(lexicon: &Lexicon, args: ClassifyArgs) -> anyhow::Result<()> {
    let seed = slangmine_core::normalize_term(&args.seed);
    anyhow::ensure!(lexicon.is_seed(&seed), "'{seed}' is not a lexicon seed");

    let mut memo = SearchMemo::load(&args.memo)
        .with_context(|| format!("failed to load memo {}", args.memo.display()))?;
    let validator = Validator::new(lexicon, &OfflineProvider, args.depth);

    let mut rows = Vec::with_capacity(args.candidates.len());
    for (i, raw) in args.candidates.iter().enumerate() {
        let candidate = slangmine_core::normalize_term(raw);
        let verdict = validator.validate(&mut memo, &candidate, &seed).await?;
        rows.push(ResultRow {
            run_id: "adhoc".into(),
            prompt_index: 0,
            query_index: i as u32,
            seed: seed.clone(),
            candidate,
            verdict,
        });
    }
    display::print_rows(&rows)
}

// ── shared ──

fn search_provider(
    args: &SearchArgs,
    cancel: CancellationToken,
) -> anyhow::Result<(Box<dyn SearchProvider>, Arc<SearchBudget>)> {
    let budget = Arc::new(SearchBudget::new((args.budget > 0).then_some(args.budget)));
    if args.offline {
        info!("offline: replaying the search memo only");
        return Ok((Box::new(OfflineProvider), budget));
    }

    let api_key = args
        .google_api_key
        .clone()
        .context("GOOGLE_API_KEY is not set (or pass --offline)")?;
    let engine_id = args
        .search_engine_id
        .clone()
        .context("SEARCH_ENG_ID is not set (or pass --offline)")?;
    let client = match &args.search_endpoint {
        Some(endpoint) => GoogleSearch::with_endpoint(endpoint.clone(), api_key, engine_id),
        None => GoogleSearch::new(api_key, engine_id),
    };
    let pacer = Arc::new(Pacer::new(Duration::from_millis(args.search_delay_ms), cancel));
    Ok((Box::new(Throttled::new(client, pacer, budget.clone())), budget))
}

fn load_memo(args: &SearchArgs) -> anyhow::Result<SearchMemo> {
    let mut memo = SearchMemo::load(&args.memo)
        .with_context(|| format!("failed to load memo {}", args.memo.display()))?;
    for path in &args.merge_memo {
        let other = SearchMemo::load(path)
            .with_context(|| format!("failed to load memo {}", path.display()))?;
        let conflicts = memo.merge(other);
        info!(path = %path.display(), conflicts, entries = memo.len(), "merged memo");
    }
    Ok(memo)
}
