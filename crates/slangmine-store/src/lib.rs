//! Storage layer: search memo snapshots (JSON), result tables (Parquet, CSV)
//! and exported synonym lexicons (TSV).

mod atomic;
mod error;
pub mod lexicon_export;
pub mod memo;
pub mod results;

pub use error::StoreError;
pub use lexicon_export::{write_generated_lexicon, write_labelled_lexicon};
pub use memo::{CacheEntry, Lookup, SearchMemo};
pub use results::{read_parquet, write_csv, write_parquet};
