//! Arrow helpers for the tab-separated reference tables.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{Array, LargeStringArray, StringArray};
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

const BATCH_SIZE: usize = 1024;

/// Parse a tab-separated table with a header row into Arrow batches.
///
/// Every column is read as nullable `Utf8`; empty cells become nulls. The
/// schema comes from the header line rather than inference so that sparse
/// variant columns never end up typed as `Null`.
pub fn read_tsv(bytes: &[u8]) -> Result<Vec<RecordBatch>, ArrowError> {
    let header_end = bytes
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(bytes.len());
    let header = String::from_utf8_lossy(&bytes[..header_end]);
    let header = header.trim_end_matches('\r');
    if header.trim().is_empty() {
        return Ok(Vec::new());
    }

    let fields: Vec<Field> = header
        .split('\t')
        .map(|name| Field::new(name.trim(), DataType::Utf8, true))
        .collect();

    let reader = ReaderBuilder::new(Arc::new(Schema::new(fields)))
        .with_header(true)
        .with_delimiter(b'\t')
        .with_batch_size(BATCH_SIZE)
        .build(Cursor::new(bytes))?;

    reader.collect()
}

/// A data row whose field count differs from the header's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaggedRow {
    /// 0-based data row, header and blank lines excluded.
    pub row: usize,
    pub expected: usize,
    pub found: usize,
}

/// First data row of an unquoted tab-separated table whose field count does
/// not match the header.
pub fn find_ragged_row(bytes: &[u8]) -> Option<RaggedRow> {
    let text = String::from_utf8_lossy(bytes);
    let mut lines = text.lines().filter(|l| !l.is_empty());
    let expected = lines.next()?.split('\t').count();
    lines.enumerate().find_map(|(row, line)| {
        let found = line.split('\t').count();
        (found != expected).then_some(RaggedRow {
            row,
            expected,
            found,
        })
    })
}

/// Extract a string value from an Arrow array (handles Utf8 and LargeUtf8).
pub fn get_string(col: &dyn Array, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    col.as_any()
        .downcast_ref::<StringArray>()
        .map(|arr| arr.value(row).to_string())
        .or_else(|| {
            col.as_any()
                .downcast_ref::<LargeStringArray>()
                .map(|arr| arr.value(row).to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_header_as_utf8_columns() {
        let tsv = b"drug\tknown\nalprazolam\txanax,xanny\ndiazepam\t-\n";
        let batches = read_tsv(tsv).unwrap();
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 2);

        let schema = batches[0].schema();
        assert_eq!(schema.fields().len(), 2);
        assert_eq!(schema.field(1).data_type(), &DataType::Utf8);

        let known = batches[0].column_by_name("known").unwrap();
        assert_eq!(get_string(known.as_ref(), 0).as_deref(), Some("xanax,xanny"));
    }

    #[test]
    fn empty_cells_are_null() {
        let tsv = b"drug\tknown\nalprazolam\t\n";
        let batches = read_tsv(tsv).unwrap();
        let known = batches[0].column_by_name("known").unwrap();
        assert_eq!(get_string(known.as_ref(), 0), None);
    }

    #[test]
    fn crlf_header_is_trimmed() {
        let tsv = b"drug\tknown\r\nalprazolam\txanax\r\n";
        let batches = read_tsv(tsv).unwrap();
        assert!(batches[0].column_by_name("known").is_some());
    }

    #[test]
    fn ragged_row_is_located() {
        let tsv = b"drug\tknown\nalprazolam\txanax\n\ndiazepam\n";
        assert_eq!(
            find_ragged_row(tsv),
            Some(RaggedRow {
                row: 1,
                expected: 2,
                found: 1
            })
        );
        assert_eq!(find_ragged_row(b"drug\tknown\r\nmdma\tmolly\r\n"), None);
        assert_eq!(find_ragged_row(b""), None);
    }

    #[test]
    fn empty_input_yields_no_batches() {
        assert!(read_tsv(b"").unwrap().is_empty());
    }
}
