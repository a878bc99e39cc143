//! In-memory file index with size and digest views.
//!
//! # Overview
//!
//! A [`FileIndex`] owns every known [`FileRecord`] keyed by path and keeps two
//! derived views over them:
//!
//! - **by size**: every record, grouped by byte size
//! - **by digest**: only records whose content digest is known
//!
//! Both views are only ever changed through `FileIndex` methods, which update
//! them together. Empty buckets are dropped as soon as their last member
//! leaves, so a bucket that exists always has at least one member.
//!
//! For use across threads the index is wrapped in a [`SharedIndex`], which
//! holds it behind a single mutex and exposes one synchronized
//! [`SharedIndex::mutate`] operation.
//!
//! # Example
//!
//! ```
//! use dupekeep::index::{FileIndex, FileRecord};
//! use dupekeep::scanner::{Digest, FileKind};
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let mut index = FileIndex::new();
//! for name in ["/a/1.txt", "/b/2.txt"] {
//!     index.insert(FileRecord::new(PathBuf::from(name), 10, SystemTime::UNIX_EPOCH));
//! }
//! assert_eq!(index.candidate_paths().len(), 2);
//!
//! index.set_digest(&PathBuf::from("/a/1.txt"), Digest::from_u64(1));
//! index.set_digest(&PathBuf::from("/b/2.txt"), Digest::from_u64(1));
//! assert_eq!(index.duplicate_buckets().len(), 1);
//! ```

pub mod store;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::scanner::{Digest, FileKind, FileStat};

pub use store::{IndexStore, StoreError, STORE_VERSION};

/// Everything the index knows about one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path of the file, unique within an index
    pub path: PathBuf,
    /// Content digest, `None` until computed
    pub digest: Option<Digest>,
    /// Size in bytes
    pub size: u64,
    /// Modification time observed when the record was last (re)built
    #[serde(with = "mtime")]
    pub modified: SystemTime,
    /// Permission bits
    pub mode: u32,
    /// Entry type observed when the record was last (re)built
    pub kind: FileKind,
}

impl FileRecord {
    /// Create a digest-less record for a regular file.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            digest: None,
            size,
            modified,
            mode: 0o644,
            kind: FileKind::Regular,
        }
    }

    /// Create a digest-less record from a captured stat.
    #[must_use]
    pub fn from_stat(path: PathBuf, stat: &FileStat) -> Self {
        Self {
            path,
            digest: None,
            size: stat.size,
            modified: stat.modified,
            mode: stat.mode,
            kind: stat.kind,
        }
    }

    /// Set the digest (builder form, mostly for tests and rehydration).
    #[must_use]
    pub fn with_digest(mut self, digest: Digest) -> Self {
        self.digest = Some(digest);
        self
    }

    /// Whether the content digest has been computed.
    #[must_use]
    pub fn is_hashed(&self) -> bool {
        self.digest.is_some()
    }
}

/// Modification times as RFC 3339 UTC timestamps with nanoseconds.
///
/// Unlike serde's own `SystemTime` encoding this covers times before the
/// Unix epoch, which some filesystems report.
mod mtime {
    use std::time::SystemTime;

    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        DateTime::<Utc>::from(*time).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
        DateTime::<Utc>::deserialize(deserializer).map(SystemTime::from)
    }
}

/// Records keyed by path, with size and digest views kept in lockstep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileIndex {
    records: HashMap<PathBuf, FileRecord>,
    by_size: HashMap<u64, BTreeSet<PathBuf>>,
    by_digest: HashMap<Digest, BTreeSet<PathBuf>>,
}

impl FileIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an index from records, e.g. after loading a snapshot.
    ///
    /// A later record with the same path replaces an earlier one.
    pub fn from_records(records: impl IntoIterator<Item = FileRecord>) -> Self {
        let mut index = Self::new();
        for record in records {
            index.insert(record);
        }
        index
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by path.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.records.get(path)
    }

    /// Whether a path is known.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.records.contains_key(path)
    }

    /// Iterate over all records in arbitrary order.
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    /// Number of records with a known digest.
    #[must_use]
    pub fn hashed_count(&self) -> usize {
        self.by_digest.values().map(BTreeSet::len).sum()
    }

    /// Snapshot of every known path, used to skip them while walking.
    #[must_use]
    pub fn known_paths(&self) -> HashSet<PathBuf> {
        self.records.keys().cloned().collect()
    }

    /// Members of the size bucket for `size`, if any.
    #[must_use]
    pub fn size_bucket(&self, size: u64) -> Option<&BTreeSet<PathBuf>> {
        self.by_size.get(&size)
    }

    /// Members of the digest bucket for `digest`, if any.
    #[must_use]
    pub fn digest_bucket(&self, digest: &Digest) -> Option<&BTreeSet<PathBuf>> {
        self.by_digest.get(digest)
    }

    /// Number of distinct sizes.
    #[must_use]
    pub fn size_bucket_count(&self) -> usize {
        self.by_size.len()
    }

    /// Number of distinct digests.
    #[must_use]
    pub fn digest_bucket_count(&self) -> usize {
        self.by_digest.len()
    }

    /// Insert a record, replacing (and returning) any record at the same path.
    pub fn insert(&mut self, record: FileRecord) -> Option<FileRecord> {
        let previous = self.remove(&record.path);
        self.attach(&record);
        self.records.insert(record.path.clone(), record);
        previous
    }

    /// Remove a record from both views.
    pub fn remove(&mut self, path: &Path) -> Option<FileRecord> {
        let record = self.records.remove(path)?;
        self.detach(&record);
        Some(record)
    }

    /// Record the content digest of a known path.
    ///
    /// Returns `false` if the path is not in the index.
    pub fn set_digest(&mut self, path: &Path, digest: Digest) -> bool {
        let Some(record) = self.records.get_mut(path) else {
            return false;
        };
        if let Some(old) = record.digest.replace(digest) {
            if old == digest {
                return true;
            }
            remove_member(&mut self.by_digest, &old, path);
        }
        self.by_digest
            .entry(digest)
            .or_default()
            .insert(path.to_path_buf());
        true
    }

    /// Forget the digest of a record and move it to the size bucket matching
    /// `stat`.
    ///
    /// Used when a file's modification time changed since it was indexed.
    /// Returns `false` if the path is not in the index.
    pub fn rehome(&mut self, path: &Path, stat: &FileStat) -> bool {
        let Some(record) = self.records.get(path).cloned() else {
            return false;
        };
        self.detach(&record);

        let updated = FileRecord::from_stat(record.path, stat);
        self.attach(&updated);
        self.records.insert(updated.path.clone(), updated);
        true
    }

    /// Paths eligible for hashing: every member of a size bucket with at
    /// least two members, in ascending (size, path) order.
    #[must_use]
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        let mut sizes: Vec<u64> = self
            .by_size
            .iter()
            .filter(|(_, members)| members.len() >= 2)
            .map(|(size, _)| *size)
            .collect();
        sizes.sort_unstable();

        sizes
            .into_iter()
            .filter_map(|size| self.by_size.get(&size))
            .flat_map(|members| members.iter().cloned())
            .collect()
    }

    /// Snapshot of every digest bucket with at least two members.
    ///
    /// Buckets come in ascending digest order and members in ascending path
    /// order.
    #[must_use]
    pub fn duplicate_buckets(&self) -> Vec<(Digest, Vec<FileRecord>)> {
        let mut buckets: Vec<(Digest, Vec<FileRecord>)> = self
            .by_digest
            .iter()
            .filter(|(_, members)| members.len() >= 2)
            .map(|(digest, members)| {
                let records = members
                    .iter()
                    .filter_map(|path| self.records.get(path).cloned())
                    .collect();
                (*digest, records)
            })
            .collect();
        buckets.sort_by_key(|(digest, _)| *digest);
        buckets
    }

    /// Check that both views agree with the records.
    ///
    /// Every record must sit in the size bucket for its size, every digested
    /// record in the digest bucket for its digest, and no bucket may be empty
    /// or name a path that disagrees with its record.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let sized: usize = self.by_size.values().map(BTreeSet::len).sum();
        let digested = self.records.values().filter(|r| r.is_hashed()).count();
        if sized != self.records.len() || self.hashed_count() != digested {
            return false;
        }

        let sizes_ok = self.by_size.iter().all(|(size, members)| {
            !members.is_empty()
                && members
                    .iter()
                    .all(|p| self.records.get(p).is_some_and(|r| r.size == *size))
        });
        let digests_ok = self.by_digest.iter().all(|(digest, members)| {
            !members.is_empty()
                && members
                    .iter()
                    .all(|p| self.records.get(p).is_some_and(|r| r.digest == Some(*digest)))
        });
        sizes_ok && digests_ok
    }

    fn attach(&mut self, record: &FileRecord) {
        self.by_size
            .entry(record.size)
            .or_default()
            .insert(record.path.clone());
        if let Some(digest) = record.digest {
            self.by_digest
                .entry(digest)
                .or_default()
                .insert(record.path.clone());
        }
    }

    fn detach(&mut self, record: &FileRecord) {
        remove_member(&mut self.by_size, &record.size, &record.path);
        if let Some(digest) = record.digest {
            remove_member(&mut self.by_digest, &digest, &record.path);
        }
    }
}

fn remove_member<K>(buckets: &mut HashMap<K, BTreeSet<PathBuf>>, key: &K, path: &Path)
where
    K: std::hash::Hash + Eq,
{
    if let Some(members) = buckets.get_mut(key) {
        members.remove(path);
        if members.is_empty() {
            buckets.remove(key);
        }
    }
}

/// A [`FileIndex`] shared between threads behind a single lock.
#[derive(Debug, Default)]
pub struct SharedIndex {
    inner: Mutex<FileIndex>,
}

impl SharedIndex {
    /// Take ownership of an index.
    #[must_use]
    pub fn new(index: FileIndex) -> Self {
        Self {
            inner: Mutex::new(index),
        }
    }

    /// Run `f` with exclusive access to the index.
    ///
    /// A panic in another holder does not leave the index half-updated
    /// (every `FileIndex` method restores its invariants before returning),
    /// so a poisoned lock is recovered rather than propagated.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut FileIndex) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Run `f` with read access to the index.
    pub fn read<R>(&self, f: impl FnOnce(&FileIndex) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Clone the current state.
    #[must_use]
    pub fn snapshot(&self) -> FileIndex {
        self.read(FileIndex::clone)
    }

    /// Give the index back.
    #[must_use]
    pub fn into_inner(self) -> FileIndex {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<FileIndex> for SharedIndex {
    fn from(index: FileIndex) -> Self {
        Self::new(index)
    }
}
