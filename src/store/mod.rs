//! Crash-safe persistence for per-domain state records.
//!
//! Every notification domain keeps exactly one JSON record on disk, written
//! atomically (temp file + rename + fsync) so a crash at any point leaves
//! either the old or the new record intact. [`SharedStore`] wraps a record
//! in an async mutex and guarantees that the disk copy is updated before a
//! mutation becomes visible to other tasks.

pub mod record;
pub mod shared;

pub use record::{PersistedRecord, StoreError, load_record, save_record_atomic, try_load_record};
pub use shared::{SharedStore, record_path};
