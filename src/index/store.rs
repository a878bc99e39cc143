//! Durable storage for a [`FileIndex`].
//!
//! The index is written as a JSON envelope carrying a SHA-256 checksum of the
//! compact JSON of the snapshot it wraps:
//!
//! ```json
//! {
//!   "checksum": "9f2c...",
//!   "snapshot": { "version": 1, "saved_at": "...", "records": [ ... ] }
//! }
//! ```
//!
//! On load the snapshot is re-serialized and the checksum recomputed, so any
//! edit or truncation is reported as [`StoreError::Corrupt`]. Records are
//! written sorted by path, which keeps the file stable between runs that
//! changed nothing.
//!
//! Writes go to a sibling temp file that is renamed into place, and are
//! serialized by a process-wide lock (see [`persistence_lock`]) that the
//! forced-exit path of the interrupt handler also takes.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use super::{FileIndex, FileRecord};

/// Current on-disk format version.
pub const STORE_VERSION: u32 = 1;

static PERSISTENCE_LOCK: Mutex<()> = Mutex::new(());

/// Acquire the process-wide persistence lock.
///
/// Held for the duration of every [`IndexStore::write`]. Anything that is
/// about to terminate the process takes it first so that a write in
/// progress is never cut short.
pub fn persistence_lock() -> MutexGuard<'static, ()> {
    PERSISTENCE_LOCK
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Errors that can occur while reading or writing the index store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// No store exists at the path yet.
    #[error("Index store not found: {0}")]
    NotFound(PathBuf),

    /// The store exists but cannot be trusted.
    #[error("Index store {path} is corrupt: {reason}")]
    Corrupt {
        /// Store path
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Reading or writing the store failed.
    #[error("I/O error for index store {path}: {source}")]
    Io {
        /// Store path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The index could not be serialized.
    #[error("Failed to encode index: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether this is the "start fresh" condition.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    saved_at: DateTime<Utc>,
    records: Vec<FileRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    checksum: String,
    snapshot: Snapshot,
}

fn checksum(snapshot: &Snapshot) -> Result<String, serde_json::Error> {
    let compact = serde_json::to_string(snapshot)?;
    let mut hasher = Sha256::new();
    hasher.update(compact.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// A persisted index at a fixed path.
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    /// Create a store handle. Nothing is touched on disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `index`, replacing any previous snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Encode`] if serialization fails and
    /// [`StoreError::Io`] if the file cannot be written or renamed.
    pub fn write(&self, index: &FileIndex) -> Result<(), StoreError> {
        let mut records: Vec<FileRecord> = index
            .records()
            .filter(|record| {
                if record.path.to_str().is_none() {
                    log::warn!(
                        "Not persisting non-UTF-8 path: {}",
                        record.path.display()
                    );
                    false
                } else {
                    true
                }
            })
            .cloned()
            .collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));

        let snapshot = Snapshot {
            version: STORE_VERSION,
            saved_at: Utc::now(),
            records,
        };
        let envelope = Envelope {
            checksum: checksum(&snapshot)?,
            snapshot,
        };
        let json = serde_json::to_string_pretty(&envelope)?;

        let _guard = persistence_lock();
        self.write_atomic(json.as_bytes())?;

        log::debug!(
            "Persisted {} records to {}",
            envelope.snapshot.records.len(),
            self.path.display()
        );
        Ok(())
    }

    fn write_atomic(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp = self.temp_path();
        let result = File::create(&tmp)
            .and_then(|mut file| {
                file.write_all(bytes)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&tmp, &self.path));

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(e));
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "index".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Load the persisted index.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if no store exists yet
    /// - [`StoreError::Corrupt`] on parse errors, checksum or version mismatch
    /// - [`StoreError::Io`] if the file exists but cannot be read
    pub fn read(&self) -> Result<FileIndex, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.clone()));
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(self.corrupt("file is not valid UTF-8"));
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let envelope: Envelope = serde_json::from_str(&content)
            .map_err(|e| self.corrupt(format!("failed to parse envelope: {e}")))?;

        // Must match the compact serialization used by `write`.
        let calculated = checksum(&envelope.snapshot)
            .map_err(|e| self.corrupt(format!("failed to re-encode snapshot: {e}")))?;
        if calculated != envelope.checksum {
            return Err(self.corrupt("checksum mismatch"));
        }

        let snapshot = envelope.snapshot;
        if snapshot.version != STORE_VERSION {
            return Err(self.corrupt(format!(
                "unsupported version {} (expected {})",
                snapshot.version, STORE_VERSION
            )));
        }

        log::debug!(
            "Loaded {} records from {} (saved {})",
            snapshot.records.len(),
            self.path.display(),
            snapshot.saved_at
        );
        Ok(FileIndex::from_records(snapshot.records))
    }

    fn corrupt(&self, reason: impl Into<String>) -> StoreError {
        StoreError::Corrupt {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}
