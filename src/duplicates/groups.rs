//! Deterministic snapshots of duplicate buckets.
//!
//! A [`DuplicateGroup`] freezes one digest bucket for rule evaluation:
//! members ordered by path (lexical ascending) plus the positions of the
//! most recently and least recently modified members, all computed once
//! when the group is built.
//!
//! # Ties
//!
//! When several members share the newest (or oldest) modification time, the
//! one that comes first in path order is the most recent (or oldest) member.
//! Keep-most-recent and keep-oldest therefore always keep the lexically first
//! of the tied copies.
//!
//! # Example
//!
//! ```
//! use dupekeep::duplicates::DuplicateGroup;
//! use dupekeep::index::FileRecord;
//! use dupekeep::scanner::Digest;
//! use std::path::PathBuf;
//! use std::time::{Duration, SystemTime};
//!
//! let t0 = SystemTime::UNIX_EPOCH;
//! let t1 = t0 + Duration::from_secs(10);
//! let group = DuplicateGroup::new(
//!     Digest::from_u64(1),
//!     vec![
//!         FileRecord::new(PathBuf::from("/b"), 4, t1),
//!         FileRecord::new(PathBuf::from("/a"), 4, t0),
//!     ],
//! );
//! assert_eq!(group.members()[0].path, PathBuf::from("/a"));
//! assert_eq!(group.most_recent(), 1);
//! assert_eq!(group.oldest(), 0);
//! ```

use crate::index::{FileIndex, FileRecord};
use crate::scanner::Digest;

/// One bucket of byte-identical files, frozen in path order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    digest: Digest,
    size: u64,
    members: Vec<FileRecord>,
    most_recent: usize,
    oldest: usize,
}

impl DuplicateGroup {
    /// Build a group from the members of one digest bucket.
    ///
    /// Members are sorted by path. Among members sharing the newest (or
    /// oldest) modification time, the lexically first one is chosen.
    #[must_use]
    pub fn new(digest: Digest, mut members: Vec<FileRecord>) -> Self {
        members.sort_by(|a, b| a.path.cmp(&b.path));

        let mut most_recent = 0;
        let mut oldest = 0;
        for (i, member) in members.iter().enumerate().skip(1) {
            if member.modified > members[most_recent].modified {
                most_recent = i;
            }
            if member.modified < members[oldest].modified {
                oldest = i;
            }
        }

        let size = members.first().map_or(0, |m| m.size);
        Self {
            digest,
            size,
            members,
            most_recent,
            oldest,
        }
    }

    /// Content digest shared by all members.
    #[must_use]
    pub fn digest(&self) -> Digest {
        self.digest
    }

    /// Size of each member in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Members in ascending path order.
    #[must_use]
    pub fn members(&self) -> &[FileRecord] {
        &self.members
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Position of the most recently modified member.
    #[must_use]
    pub fn most_recent(&self) -> usize {
        self.most_recent
    }

    /// Position of the least recently modified member.
    #[must_use]
    pub fn oldest(&self) -> usize {
        self.oldest
    }

    /// Bytes that would be freed by keeping a single copy.
    #[must_use]
    pub fn reclaimable(&self) -> u64 {
        self.size * (self.members.len().saturating_sub(1) as u64)
    }
}

/// Snapshot every digest bucket with two or more members, in ascending
/// digest order.
#[must_use]
pub fn duplicate_groups(index: &FileIndex) -> Vec<DuplicateGroup> {
    index
        .duplicate_buckets()
        .into_iter()
        .map(|(digest, members)| DuplicateGroup::new(digest, members))
        .collect()
}
