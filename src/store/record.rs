//! Atomic persistence of per-domain state records.
//!
//! Each notification domain owns one JSON record on disk
//! (`<state_dir>/<domain>.json`). Records are written atomically using a
//! write-to-temp-then-rename pattern:
//!
//! 1. Write to `<path>.tmp`
//! 2. fsync the temp file
//! 3. Rename to `<path>`
//! 4. fsync the parent directory
//!
//! This ensures that readers always see either the old or new record, never
//! a partial write. A crash mid-write leaves at worst a stale `.tmp` file,
//! which the next successful write overwrites.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors that can occur during record persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Schema version mismatch.
    #[error("schema version mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: u32, got: u32 },
}

/// Result type for record operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// A state record that can be persisted to disk.
///
/// Implementors carry a `schema_version` field in their serialized form so
/// that a record written by an incompatible build is detected on load
/// instead of being silently misinterpreted.
pub trait PersistedRecord: Serialize + DeserializeOwned + Clone + Send + 'static {
    /// Current schema version. Increment when making breaking changes.
    const SCHEMA_VERSION: u32;

    /// The schema version stored in this record instance.
    fn schema_version(&self) -> u32;
}

/// Saves a record atomically to disk.
///
/// # Errors
///
/// Returns an error if any IO operation fails.
pub fn save_record_atomic<T: PersistedRecord>(path: &Path, record: &T) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(record)?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }

    std::fs::rename(&tmp_path, path)?;

    // The rename lives in the directory entry; without syncing the parent
    // it may not survive power loss even though the contents did.
    if let Some(parent) = path.parent() {
        fsync_dir(parent)?;
    }

    Ok(())
}

/// Syncs a directory so the entries inside it (a fresh rename, in our
/// case) are durable.
fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(dir_path)?;
    dir.sync_all()
}

/// Loads a record from disk.
///
/// # Errors
///
/// Returns an error if:
/// - The file doesn't exist or can't be read
/// - The JSON is malformed
/// - The schema version is incompatible
pub fn load_record<T: PersistedRecord>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path)?;
    let record: T = serde_json::from_slice(&bytes)?;

    if record.schema_version() != T::SCHEMA_VERSION {
        return Err(StoreError::SchemaMismatch {
            expected: T::SCHEMA_VERSION,
            got: record.schema_version(),
        });
    }

    Ok(record)
}

/// Attempts to load a record, returning None if the file doesn't exist.
///
/// Other errors (malformed JSON, schema mismatch) are propagated.
pub fn try_load_record<T: PersistedRecord>(path: &Path) -> Result<Option<T>> {
    match load_record(path) {
        Ok(record) => Ok(Some(record)),
        Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
