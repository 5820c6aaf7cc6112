//! Shared in-memory state with write-through persistence.
//!
//! `SharedStore<T>` is the single authority for one domain's state. All
//! mutations go through [`SharedStore::update`], which holds an async mutex
//! across the read-modify-write and persists the new record to disk *before*
//! the in-memory copy is replaced and the lock released. Concurrent callers
//! serialize on the mutex, so no update can be lost, and a failed write
//! leaves the in-memory state exactly as it was.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, warn};

use super::record::{PersistedRecord, Result, save_record_atomic, try_load_record};

/// A shared, mutex-guarded handle to one domain's persisted state.
pub struct SharedStore<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

struct Inner<T> {
    state: T,
    path: PathBuf,
}

impl<T> Clone for SharedStore<T> {
    fn clone(&self) -> Self {
        SharedStore {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: PersistedRecord> SharedStore<T> {
    /// Loads the record at `path`, falling back to `default` on any failure.
    ///
    /// A missing file is a normal first run. A malformed or
    /// schema-incompatible record is treated as corruption: it is logged
    /// loudly and replaced with the default so that one damaged domain
    /// record never takes the whole process down.
    pub fn load_or_default(path: impl Into<PathBuf>, default: T) -> Self {
        let path = path.into();
        let state = match try_load_record::<T>(&path) {
            Ok(Some(record)) => record,
            Ok(None) => default,
            Err(e) => {
                error!(
                    path = %path.display(),
                    error = %e,
                    "state record unreadable, starting from defaults"
                );
                default
            }
        };

        SharedStore {
            inner: Arc::new(Mutex::new(Inner { state, path })),
        }
    }

    /// Returns a clone of the current state.
    pub async fn snapshot(&self) -> T {
        self.inner.lock().await.state.clone()
    }

    /// Runs a read-only closure against the current state.
    pub async fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.lock().await;
        f(&guard.state)
    }

    /// Applies a mutation and persists the result before committing it.
    ///
    /// The closure runs against a working copy. If the disk write fails it
    /// is retried once; if the retry also fails, the error is returned and
    /// the in-memory state is left untouched, so memory never runs ahead of
    /// disk.
    pub async fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut guard = self.inner.lock().await;
        let mut next = guard.state.clone();
        let out = f(&mut next);

        if let Err(first) = save_record_atomic(&guard.path, &next) {
            warn!(
                path = %guard.path.display(),
                error = %first,
                "state write failed, retrying once"
            );
            save_record_atomic(&guard.path, &next)?;
        }

        guard.state = next;
        Ok(out)
    }

    /// The on-disk path backing this store.
    pub async fn path(&self) -> PathBuf {
        self.inner.lock().await.path.clone()
    }
}

/// Builds the record path for a domain inside a state directory.
pub fn record_path(state_dir: &Path, stem: &str) -> PathBuf {
    state_dir.join(format!("{stem}.json"))
}
