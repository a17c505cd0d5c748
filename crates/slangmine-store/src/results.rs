//! The batch result table: conversion between [`ResultRow`]s and Arrow, and
//! Parquet / CSV files on disk.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, StringArray, UInt32Array};
use arrow::csv::WriterBuilder;
use arrow::datatypes::UInt32Type;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use slangmine_core::results::{self as cols, result_table_schema};
use slangmine_core::table::get_string;
use slangmine_core::{ResultRow, SearchOutcome, SearchTier, Verdict};
use tracing::info;

use crate::StoreError;
use crate::atomic::write_atomically;

/// Build one record batch from `rows`.
pub fn rows_to_batch(rows: &[ResultRow]) -> Result<RecordBatch, StoreError> {
    let strings = |f: fn(&ResultRow) -> &str| -> ArrayRef {
        Arc::new(StringArray::from_iter_values(rows.iter().map(f)))
    };

    let columns: Vec<ArrayRef> = vec![
        strings(|r| r.run_id.as_str()),
        Arc::new(UInt32Array::from_iter_values(
            rows.iter().map(|r| r.prompt_index),
        )),
        Arc::new(UInt32Array::from_iter_values(
            rows.iter().map(|r| r.query_index),
        )),
        strings(|r| r.seed.as_str()),
        strings(|r| r.candidate.as_str()),
        Arc::new(BooleanArray::from_iter(
            rows.iter().map(|r| Some(r.verdict.exact_seed_match)),
        )),
        Arc::new(StringArray::from_iter(
            rows.iter().map(|r| r.verdict.owning_seed(&r.seed)),
        )),
        Arc::new(BooleanArray::from_iter(
            rows.iter().map(|r| Some(r.verdict.substring_match)),
        )),
        strings(|r| r.verdict.search_result.as_str()),
        Arc::new(StringArray::from_iter(
            rows.iter()
                .map(|r| r.verdict.search_result.tier().map(|t| t.as_str())),
        )),
        Arc::new(UInt32Array::from_iter(
            rows.iter().map(|r| r.verdict.search_result.rank()),
        )),
        strings(|r| r.verdict.bucket().as_str()),
    ];

    Ok(RecordBatch::try_new(
        Arc::new(result_table_schema()),
        columns,
    )?)
}

/// Rebuild rows from a result-table batch. The stored `bucket` column is
/// ignored; buckets are always derived from the verdict.
pub fn batch_to_rows(batch: &RecordBatch, row_base: usize) -> Result<Vec<ResultRow>, StoreError> {
    let column = |name: &'static str| {
        batch
            .column_by_name(name)
            .ok_or(StoreError::MissingColumn(name))
    };
    let run_id = column(cols::RUN_ID)?;
    let prompt_index = uint32(column(cols::PROMPT_INDEX)?, cols::PROMPT_INDEX)?;
    let query_index = uint32(column(cols::QUERY_INDEX)?, cols::QUERY_INDEX)?;
    let seed = column(cols::SEED)?;
    let candidate = column(cols::CANDIDATE)?;
    let exact = boolean(column(cols::EXACT_SEED_MATCH)?, cols::EXACT_SEED_MATCH)?;
    let owning = column(cols::OWNING_SEED)?;
    let substring = boolean(column(cols::SUBSTRING_MATCH)?, cols::SUBSTRING_MATCH)?;
    let outcome = column(cols::SEARCH_OUTCOME)?;
    let added = column(cols::ADDED_TOKEN)?;
    let rank = uint32(column(cols::RANK)?, cols::RANK)?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let malformed = |reason: String| StoreError::Malformed {
            row: row_base + i,
            reason,
        };
        let required = |col: &ArrayRef, name: &str| {
            get_string(col.as_ref(), i).ok_or_else(|| malformed(format!("null {name}")))
        };

        let seed = required(seed, cols::SEED)?;
        let owning_seed = get_string(owning.as_ref(), i);
        let search_result = parse_outcome(
            &required(outcome, cols::SEARCH_OUTCOME)?,
            get_string(added.as_ref(), i).as_deref(),
            (!rank.is_null(i)).then(|| rank.value(i)),
        )
        .map_err(malformed)?;

        let verdict = Verdict {
            exact_seed_match: exact.value(i),
            cross_seed_match: owning_seed.filter(|o| *o != seed),
            substring_match: substring.value(i),
            search_result,
        };
        rows.push(ResultRow {
            run_id: required(run_id, cols::RUN_ID)?,
            prompt_index: prompt_index.value(i),
            query_index: query_index.value(i),
            candidate: required(candidate, cols::CANDIDATE)?,
            seed,
            verdict,
        });
    }
    Ok(rows)
}

fn uint32<'a>(col: &'a ArrayRef, name: &'static str) -> Result<&'a UInt32Array, StoreError> {
    col.as_primitive_opt::<UInt32Type>()
        .ok_or(StoreError::MissingColumn(name))
}

fn boolean<'a>(col: &'a ArrayRef, name: &'static str) -> Result<&'a BooleanArray, StoreError> {
    col.as_boolean_opt().ok_or(StoreError::MissingColumn(name))
}

fn parse_outcome(
    outcome: &str,
    added_token: Option<&str>,
    rank: Option<u32>,
) -> Result<SearchOutcome, String> {
    match outcome {
        "not_searched" => Ok(SearchOutcome::NotSearched),
        "not_corroborated" => Ok(SearchOutcome::NotCorroborated),
        "search_failed" => Ok(SearchOutcome::SearchFailed),
        "corroborated" => {
            let tier: SearchTier = added_token
                .ok_or("corroborated row without added_token")?
                .parse()?;
            let rank = rank.ok_or("corroborated row without rank")?;
            Ok(SearchOutcome::Corroborated { tier, rank })
        }
        other => Err(format!("unknown search outcome '{other}'")),
    }
}

/// Write `rows` as a single-batch Parquet file, replacing `path` atomically.
pub fn write_parquet(path: &Path, rows: &[ResultRow]) -> Result<(), StoreError> {
    let batch = rows_to_batch(rows)?;
    write_atomically(path, |tmp| {
        let mut writer = ArrowWriter::try_new(tmp, batch.schema(), None)?;
        writer.write(&batch)?;
        Ok(writer.into_inner()?)
    })?;
    info!(path = %path.display(), rows = rows.len(), "result table written");
    Ok(())
}

pub fn read_parquet(path: &Path) -> Result<Vec<ResultRow>, StoreError> {
    let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        let base = rows.len();
        rows.extend(batch_to_rows(&batch, base)?);
    }
    info!(path = %path.display(), rows = rows.len(), "result table loaded");
    Ok(rows)
}

/// Export `rows` as comma-separated text with a header line.
pub fn write_csv(path: &Path, rows: &[ResultRow]) -> Result<(), StoreError> {
    let batch = rows_to_batch(rows)?;
    write_atomically(path, |tmp| {
        let mut writer = WriterBuilder::new().with_header(true).build(tmp);
        writer.write(&batch)?;
        Ok(writer.into_inner())
    })?;
    info!(path = %path.display(), rows = rows.len(), "csv export written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(candidate: &str, verdict: Verdict) -> ResultRow {
        ResultRow {
            run_id: "20260101T000000".into(),
            prompt_index: 1,
            query_index: 4,
            seed: "alprazolam".into(),
            candidate: candidate.into(),
            verdict,
        }
    }

    fn sample() -> Vec<ResultRow> {
        vec![
            row(
                "xanax",
                Verdict {
                    exact_seed_match: true,
                    cross_seed_match: None,
                    substring_match: true,
                    search_result: SearchOutcome::NotSearched,
                },
            ),
            row(
                "valium",
                Verdict {
                    exact_seed_match: false,
                    cross_seed_match: Some("diazepam".into()),
                    substring_match: true,
                    search_result: SearchOutcome::NotSearched,
                },
            ),
            row(
                "blue_football",
                Verdict {
                    exact_seed_match: false,
                    cross_seed_match: None,
                    substring_match: false,
                    search_result: SearchOutcome::Corroborated {
                        tier: SearchTier::Pill,
                        rank: 7,
                    },
                },
            ),
            row(
                "zanbar",
                Verdict {
                    exact_seed_match: false,
                    cross_seed_match: None,
                    substring_match: false,
                    search_result: SearchOutcome::SearchFailed,
                },
            ),
        ]
    }

    #[test]
    fn batch_columns_carry_verdict_fields() {
        let batch = rows_to_batch(&sample()).unwrap();
        assert_eq!(batch.num_rows(), 4);
        let owning = batch.column_by_name(cols::OWNING_SEED).unwrap();
        assert_eq!(get_string(owning.as_ref(), 0).as_deref(), Some("alprazolam"));
        assert_eq!(get_string(owning.as_ref(), 1).as_deref(), Some("diazepam"));
        assert_eq!(get_string(owning.as_ref(), 2), None);

        let bucket = batch.column_by_name(cols::BUCKET).unwrap();
        assert_eq!(get_string(bucket.as_ref(), 2).as_deref(), Some("novel_corroborated"));
        assert_eq!(get_string(bucket.as_ref(), 3).as_deref(), Some("search_error"));

        let added = batch.column_by_name(cols::ADDED_TOKEN).unwrap();
        assert_eq!(get_string(added.as_ref(), 2).as_deref(), Some("pill"));
    }

    #[test]
    fn parquet_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.parquet");
        let rows = sample();
        write_parquet(&path, &rows).unwrap();
        assert_eq!(read_parquet(&path).unwrap(), rows);
    }

    #[test]
    fn csv_export_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        write_csv(&path, &sample()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("run_id,prompt_index"));
        assert_eq!(lines.count(), 4);
    }

    #[test]
    fn rejects_unknown_outcome() {
        assert!(parse_outcome("maybe", None, None).is_err());
        assert!(parse_outcome("corroborated", Some("pill"), None).is_err());
        assert_eq!(
            parse_outcome("corroborated", Some("slang"), Some(3)),
            Ok(SearchOutcome::Corroborated {
                tier: SearchTier::Slang,
                rank: 3
            })
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_parquet(Path::new("/nonexistent/results.parquet")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
