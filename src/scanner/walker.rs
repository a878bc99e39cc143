//! Directory walker that feeds new files into the index.
//!
//! # Overview
//!
//! The [`Walker`] traverses each root with [`walkdir`] (symlinks are never
//! followed, entries are visited in file-name order) and inserts a
//! digest-less [`FileRecord`] into the size view for every regular,
//! non-empty file the index does not know yet.
//!
//! Per-root errors, including a root that does not exist, are logged and
//! counted; the remaining roots are still walked. Cancellation aborts the
//! whole walk and is reported as [`WalkError::Stopped`], distinct from I/O
//! failures.
//!
//! # Example
//!
//! ```no_run
//! use dupekeep::index::FileIndex;
//! use dupekeep::scanner::Walker;
//! use std::path::PathBuf;
//!
//! let mut index = FileIndex::new();
//! let stats = Walker::new(vec![PathBuf::from("/home/user/Downloads")])
//!     .walk(&mut index)
//!     .unwrap();
//! println!("{} new files", stats.new_files);
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use walkdir::WalkDir;

use crate::index::{FileIndex, FileRecord};
use crate::progress::ProgressCallback;
use crate::signal::CancellationToken;

use super::{FileStat, ScanError};

/// Counters for one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    /// Files added to the index
    pub new_files: usize,
    /// Files skipped because the index already knew them
    pub known_skipped: usize,
    /// Zero-byte files skipped
    pub empty_skipped: usize,
    /// Entries that could not be read
    pub errors: usize,
}

/// Why a walk did not complete.
#[derive(thiserror::Error, Debug)]
pub enum WalkError {
    /// Cancellation was requested. Files found so far stay in the index.
    #[error("Walk stopped after {} new files", stats.new_files)]
    Stopped {
        /// Counters up to the point of cancellation
        stats: WalkStats,
    },
}

/// Walks a set of roots and records new files.
pub struct Walker {
    roots: Vec<PathBuf>,
    cancel: Option<CancellationToken>,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("roots", &self.roots)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Walker {
    /// Create a walker over `roots`.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            cancel: None,
            progress: None,
        }
    }

    /// Stop walking once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Report each discovered file to `callback`.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Walk every root, inserting new files into `index`.
    ///
    /// Paths already present in `index` when they are reached are skipped
    /// without a stat, so records loaded from a previous run keep their
    /// digests and a path reachable from two roots is recorded once.
    ///
    /// # Errors
    ///
    /// Returns [`WalkError::Stopped`] if cancellation is observed.
    pub fn walk(&self, index: &mut FileIndex) -> Result<WalkStats, WalkError> {
        let mut stats = WalkStats::default();

        if let Some(ref callback) = self.progress {
            callback.on_phase_start("walking", 0);
        }

        for root in &self.roots {
            log::debug!("Walking {}", root.display());
            let walk = WalkDir::new(root)
                .follow_links(false)
                .sort_by_file_name();

            for entry in walk {
                if self.is_cancelled() {
                    log::debug!("Walker: cancellation requested, stopping");
                    return Err(WalkError::Stopped { stats });
                }

                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        let path = e.path().map_or_else(|| root.clone(), PathBuf::from);
                        let error = match e.into_io_error() {
                            Some(io) => ScanError::from_io(&path, io),
                            None => ScanError::Io {
                                path: path.clone(),
                                source: std::io::Error::other("filesystem loop"),
                            },
                        };
                        log::warn!("{}", error);
                        stats.errors += 1;
                        continue;
                    }
                };

                if !entry.file_type().is_file() {
                    continue;
                }

                let path = entry.path();
                if index.contains(path) {
                    log::trace!("Already indexed: {}", path.display());
                    stats.known_skipped += 1;
                    continue;
                }

                let stat = match entry.metadata() {
                    Ok(metadata) => FileStat::from_metadata(&metadata),
                    Err(e) => {
                        let error = match e.into_io_error() {
                            Some(io) => ScanError::from_io(path, io),
                            None => ScanError::NotFound(path.to_path_buf()),
                        };
                        log::warn!("Skipping {}", error);
                        stats.errors += 1;
                        continue;
                    }
                };

                if !stat.kind.is_regular() {
                    continue;
                }
                if stat.size == 0 {
                    log::trace!("Skipping empty file: {}", path.display());
                    stats.empty_skipped += 1;
                    continue;
                }

                index.insert(FileRecord::from_stat(path.to_path_buf(), &stat));
                stats.new_files += 1;

                if let Some(ref callback) = self.progress {
                    callback.on_progress(stats.new_files, path.to_string_lossy().as_ref());
                }
            }
        }

        if let Some(ref callback) = self.progress {
            callback.on_phase_end("walking");
        }

        log::info!(
            "Walk complete: {} new, {} already indexed, {} empty, {} errors",
            stats.new_files,
            stats.known_skipped,
            stats.empty_skipped,
            stats.errors
        );
        Ok(stats)
    }
}
