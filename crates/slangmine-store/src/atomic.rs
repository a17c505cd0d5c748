//! Snapshot writes that never leave a half-written file behind.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::StoreError;

/// Write `path` by filling a temp file in the same directory, then renaming
/// it over the target.
pub(crate) fn write_atomically<F>(path: &Path, fill: F) -> Result<(), StoreError>
where
    F: FnOnce(NamedTempFile) -> Result<NamedTempFile, StoreError>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    let mut tmp = fill(tmp)?;
    tmp.flush().map_err(|e| StoreError::io(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}
