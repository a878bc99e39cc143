//! Scanner module for directory traversal, validation and file hashing.
//!
//! This module provides functionality for:
//! - Discovering new files under one or more roots
//! - Re-validating a previously persisted index against the filesystem
//! - Content fingerprinting with xxh3
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`validate`]: Reconciliation of a loaded index with current disk state
//! - [`hasher`]: xxh3 file hashing (streaming or memory-mapped)
//!
//! All filesystem metadata enters the crate through [`FileStat::capture`], which
//! turns a `std::fs::Metadata` into portable values. Raw platform stat
//! structures never reach the index.
//!
//! # Example
//!
//! ```no_run
//! use dupekeep::scanner::{FileKind, FileStat};
//! use std::path::Path;
//!
//! let stat = FileStat::capture(Path::new("Cargo.toml")).unwrap();
//! assert_eq!(stat.kind, FileKind::Regular);
//! ```

pub mod hasher;
pub mod validate;
pub mod walker;

use std::fs::{FileType, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

// Re-export main types
pub use hasher::{Digest, Hasher, DEFAULT_MMAP_THRESHOLD};
pub use validate::{validate_index, ValidationStats};
pub use walker::{WalkError, WalkStats, Walker};

/// Portable classification of a filesystem entry.
///
/// Only used to notice that a path changed type between runs; anything that
/// is not a regular file is never hashed or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// A regular file
    Regular,
    /// A directory
    Directory,
    /// A symbolic link (never followed)
    Symlink,
    /// Sockets, fifos, devices and anything else
    Other,
}

impl FileKind {
    /// Whether this is a regular file.
    #[must_use]
    pub fn is_regular(self) -> bool {
        self == Self::Regular
    }
}

impl From<FileType> for FileKind {
    fn from(file_type: FileType) -> Self {
        if file_type.is_file() {
            Self::Regular
        } else if file_type.is_dir() {
            Self::Directory
        } else if file_type.is_symlink() {
            Self::Symlink
        } else {
            Self::Other
        }
    }
}

/// Snapshot of the metadata the index cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
    /// Permission bits (`st_mode & 0o7777` on Unix)
    pub mode: u32,
    /// Entry type, symlinks are not followed
    pub kind: FileKind,
}

impl FileStat {
    /// Stat a path without following symlinks.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the path cannot be stat'ed.
    pub fn capture(path: &Path) -> io::Result<Self> {
        std::fs::symlink_metadata(path).map(|metadata| Self::from_metadata(&metadata))
    }

    /// Build a snapshot from already retrieved metadata.
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            mode: permission_bits(metadata),
            kind: FileKind::from(metadata.file_type()),
        }
    }
}

#[cfg(unix)]
fn permission_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    /// Classify an I/O error for the given path.
    #[must_use]
    pub fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl HashError {
    /// Classify an I/O error for the given path.
    #[must_use]
    pub fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
