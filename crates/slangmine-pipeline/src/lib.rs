//! Candidate validation and the runs built on it.
//!
//! [`Validator`] decides one (candidate, seed) pair through the lexicon
//! stages and, when those are inconclusive, tiered search via the memo.
//! [`GenerationRun`] drives prompts through a [`slangmine_ai::Generator`]
//! and validates what comes back; [`rerun_searches`] revisits the search
//! stage of a stored table.

mod error;
pub mod rerun;
pub mod run;
pub mod validator;

pub use error::{Halt, PipelineError};
pub use rerun::{RerunOptions, RerunReport, rerun_searches};
pub use run::{GenerationRun, RunConfig, RunReport, new_run_id};
pub use validator::Validator;
