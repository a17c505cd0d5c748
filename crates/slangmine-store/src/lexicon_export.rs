//! Tab-separated synonym lexicons written after a run.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, StringArray};
use arrow::csv::WriterBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use slangmine_core::synonyms::format_synonyms;
use slangmine_core::{GeneratedSynonyms, LabelledSynonyms};
use tracing::info;

use crate::StoreError;
use crate::atomic::write_atomically;

pub const SEED_COLUMN: &str = "index term";
pub const DBID_COLUMN: &str = "DrugBank ID";
pub const DISCUSSED_COLUMN: &str = "widely discussed";
pub const GENERATED_COLUMN: &str = "generated synonyms";
pub const SPECIFIC_COLUMN: &str = "specific synonyms";
pub const BROAD_COLUMN: &str = "broad synonyms";

fn text(name: &str) -> Field {
    Field::new(name, DataType::Utf8, true)
}

fn write_tsv(path: &Path, batch: &RecordBatch) -> Result<(), StoreError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
    }
    write_atomically(path, |tmp| {
        let mut writer = WriterBuilder::new()
            .with_header(true)
            .with_delimiter(b'\t')
            .build(tmp);
        writer.write(batch)?;
        Ok(writer.into_inner())
    })
}

/// Write the generated lexicon: one line per seed with its validated
/// synonyms.
pub fn write_generated_lexicon(
    path: &Path,
    entries: &[GeneratedSynonyms],
) -> Result<(), StoreError> {
    let schema = Schema::new(vec![
        text(SEED_COLUMN),
        text(DBID_COLUMN),
        Field::new(DISCUSSED_COLUMN, DataType::Boolean, false),
        text(GENERATED_COLUMN),
    ]);
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            entries.iter().map(|e| e.seed.as_str()),
        )),
        Arc::new(StringArray::from_iter(
            entries.iter().map(|e| e.dbid.as_deref()),
        )),
        Arc::new(BooleanArray::from_iter(
            entries.iter().map(|e| Some(e.widely_discussed)),
        )),
        Arc::new(StringArray::from_iter_values(
            entries.iter().map(|e| format_synonyms(&e.synonyms)),
        )),
    ];
    let batch = RecordBatch::try_new(Arc::new(schema), columns)?;
    write_tsv(path, &batch)?;
    info!(path = %path.display(), seeds = entries.len(), "generated lexicon written");
    Ok(())
}

/// Write the manually labelled lexicon: specific and broad synonyms per seed.
pub fn write_labelled_lexicon(
    path: &Path,
    entries: &[LabelledSynonyms],
) -> Result<(), StoreError> {
    let schema = Schema::new(vec![
        text(SEED_COLUMN),
        text(DBID_COLUMN),
        text(SPECIFIC_COLUMN),
        text(BROAD_COLUMN),
    ]);
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            entries.iter().map(|e| e.seed.as_str()),
        )),
        Arc::new(StringArray::from_iter(
            entries.iter().map(|e| e.dbid.as_deref()),
        )),
        Arc::new(StringArray::from_iter_values(
            entries.iter().map(|e| format_synonyms(&e.specific)),
        )),
        Arc::new(StringArray::from_iter_values(
            entries.iter().map(|e| format_synonyms(&e.broad)),
        )),
    ];
    let batch = RecordBatch::try_new(Arc::new(schema), columns)?;
    write_tsv(path, &batch)?;
    info!(path = %path.display(), seeds = entries.len(), "labelled lexicon written");
    Ok(())
}
