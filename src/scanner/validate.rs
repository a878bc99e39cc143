//! Reconciliation of a loaded index with the filesystem.
//!
//! A persisted index is only trusted as far as modification times go. Every
//! record is re-stat'ed (symlinks not followed) and then:
//!
//! - dropped if the stat fails, the path is no longer a regular file, or the
//!   file is now empty
//! - kept with its digest if the modification time is unchanged
//! - otherwise moved to the size bucket for its current size with the digest
//!   cleared, so it is hashed again if it still has a same-size peer
//!
//! Nothing on disk is modified.

use std::path::PathBuf;

use serde::Serialize;

use crate::index::FileIndex;

use super::FileStat;

/// Outcome counts of a validation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidationStats {
    /// Records examined
    pub checked: usize,
    /// Records kept as they were
    pub unchanged: usize,
    /// Records whose digest was cleared because the file changed
    pub rehomed: usize,
    /// Records dropped from the index
    pub removed: usize,
}

/// Re-stat every record in `index` and bring it in line with disk state.
pub fn validate_index(index: &mut FileIndex) -> ValidationStats {
    let mut stats = ValidationStats::default();

    let mut paths: Vec<PathBuf> = index.records().map(|r| r.path.clone()).collect();
    paths.sort();

    for path in paths {
        let Some(record) = index.get(&path) else {
            continue;
        };
        let recorded_mtime = record.modified;
        stats.checked += 1;

        let stat = match FileStat::capture(&path) {
            Ok(stat) => stat,
            Err(e) => {
                log::debug!("Dropping {}: {}", path.display(), e);
                index.remove(&path);
                stats.removed += 1;
                continue;
            }
        };

        if stat.modified == recorded_mtime && stat.kind.is_regular() {
            stats.unchanged += 1;
            continue;
        }

        if !stat.kind.is_regular() || stat.size == 0 {
            log::debug!(
                "Dropping {}: no longer a non-empty regular file",
                path.display()
            );
            index.remove(&path);
            stats.removed += 1;
        } else {
            log::debug!("Modified since last run: {}", path.display());
            index.rehome(&path, &stat);
            stats.rehomed += 1;
        }
    }

    log::info!(
        "Validated {} indexed files: {} unchanged, {} changed, {} removed",
        stats.checked,
        stats.unchanged,
        stats.rehomed,
        stats.removed
    );
    stats
}
