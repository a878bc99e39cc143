//! File removal that keeps the index in line with disk truth.
//!
//! # Overview
//!
//! The [`Deleter`] removes one file at a time, either permanently
//! ([`std::fs::remove_file`]) or by moving it to the system trash
//! ([`trash::delete`]). Whatever the removal call reports, the path is
//! stat'ed afterwards: a path that is confirmed gone is purged from the
//! index, a path that is still there keeps its record. The index is only
//! touched through [`SharedIndex`], the same lock the hashing workers use.
//!
//! # Example
//!
//! ```no_run
//! use dupekeep::actions::delete::{DeleteMethod, Deleter};
//! use dupekeep::index::SharedIndex;
//! use std::path::Path;
//!
//! let index = SharedIndex::default();
//! let outcome = Deleter::new(DeleteMethod::Trash).delete(&index, Path::new("/tmp/copy.txt"));
//! println!("{:?}", outcome);
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::SharedIndex;

/// Error type for deletion operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed {
        /// File that could not be trashed
        path: PathBuf,
        /// Error reported by the trash backend
        message: String,
    },

    /// Removal reported success but the file is still there.
    #[error("file still present after removal: {0}")]
    StillPresent(PathBuf),

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// File that could not be removed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied(p)
            | Self::StillPresent(p)
            | Self::TrashFailed { path: p, .. }
            | Self::Io { path: p, .. } => p,
        }
    }
}

/// How files are removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMethod {
    /// Unlink the file
    #[default]
    Permanent,
    /// Move the file to the system trash
    Trash,
}

/// What happened to one file.
#[derive(Debug)]
pub enum DeleteOutcome {
    /// The file is gone and its record was purged.
    Removed {
        /// Size of the removed file
        size: u64,
    },
    /// The file is still on disk; its record was kept.
    Failed(DeleteError),
}

impl DeleteOutcome {
    /// Whether the file is gone.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed { .. })
    }
}

/// Removes files and reconciles the index afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deleter {
    method: DeleteMethod,
}

impl Deleter {
    /// Create a deleter using `method`.
    #[must_use]
    pub fn new(method: DeleteMethod) -> Self {
        Self { method }
    }

    /// Configured removal method.
    #[must_use]
    pub fn method(&self) -> DeleteMethod {
        self.method
    }

    /// Remove `path` and update `index` to match what is on disk afterwards.
    ///
    /// Removal errors are logged. The record is purged only if the path no
    /// longer exists, even when the removal call itself reported an error.
    pub fn delete(&self, index: &SharedIndex, path: &Path) -> DeleteOutcome {
        let size = index.read(|index| index.get(path).map_or(0, |r| r.size));

        let removal = self.remove(path);
        if let Err(ref e) = removal {
            log::error!("Failed to delete {}", e);
        }

        match fs::symlink_metadata(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                index.mutate(|index| index.remove(path));
                match self.method {
                    DeleteMethod::Permanent => {
                        log::info!("Deleted: {} ({} bytes)", path.display(), size);
                    }
                    DeleteMethod::Trash => {
                        log::info!("Moved to trash: {} ({} bytes)", path.display(), size);
                    }
                }
                DeleteOutcome::Removed { size }
            }
            Err(e) => {
                log::warn!("Could not confirm removal of {}: {}", path.display(), e);
                match removal {
                    Ok(()) => DeleteOutcome::Failed(DeleteError::from_io(path, e)),
                    Err(err) => DeleteOutcome::Failed(err),
                }
            }
            Ok(_) => DeleteOutcome::Failed(
                removal
                    .err()
                    .unwrap_or_else(|| DeleteError::StillPresent(path.to_path_buf())),
            ),
        }
    }

    fn remove(&self, path: &Path) -> Result<(), DeleteError> {
        match self.method {
            DeleteMethod::Permanent => {
                fs::remove_file(path).map_err(|e| DeleteError::from_io(path, e))
            }
            DeleteMethod::Trash => trash::delete(path).map_err(|e| DeleteError::TrashFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }
}
