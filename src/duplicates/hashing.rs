//! Concurrent content hashing of size-collision candidates.
//!
//! # Overview
//!
//! Only files that share their size with at least one other indexed file can
//! be duplicates, so only those are read. Candidates that already carry a
//! digest (loaded from a previous run and still unchanged) are skipped
//! without any I/O.
//!
//! The remaining paths are pushed through a bounded
//! [`crossbeam_channel`] queue to a fixed number of scoped worker threads.
//! Each worker hashes one file at a time and records the digest through
//! [`SharedIndex::mutate`]. Leaving the thread scope is the completion
//! barrier: when [`hash_candidates`] returns, every dispatched file has been
//! hashed or has failed.
//!
//! Cancellation is polled by the dispatcher before each send and by every
//! worker before each receive. A read already in progress runs to
//! completion.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver};
use serde::Serialize;

use crate::index::SharedIndex;
use crate::progress::ProgressCallback;
use crate::scanner::Hasher;
use crate::signal::CancellationToken;

/// Default depth of the work queue between dispatcher and workers.
pub const DEFAULT_QUEUE_DEPTH: usize = 256;

/// Number of hashing workers used when none is configured.
#[must_use]
pub fn default_workers() -> usize {
    thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

/// Configuration for the hashing stage.
#[derive(Clone)]
pub struct HashingConfig {
    /// Number of worker threads (at least 1 is always used)
    pub workers: usize,
    /// Capacity of the work queue
    pub queue_depth: usize,
    /// Cooperative cancellation
    pub cancel: Option<CancellationToken>,
    /// Optional progress callback
    pub progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for HashingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashingConfig")
            .field("workers", &self.workers)
            .field("queue_depth", &self.queue_depth)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            cancel: None,
            progress: None,
        }
    }
}

impl HashingConfig {
    /// Set the number of workers.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the work queue capacity.
    #[must_use]
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Set the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Counters for one hashing stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HashingStats {
    /// Files in size buckets with at least two members
    pub candidates: usize,
    /// Candidates that already had a digest
    pub already_hashed: usize,
    /// Files hashed in this run
    pub hashed: usize,
    /// Files that could not be read
    pub failed: usize,
    /// Bytes read while hashing
    pub bytes_hashed: u64,
    /// Whether cancellation cut the stage short
    pub interrupted: bool,
}

#[derive(Default)]
struct Counters {
    hashed: AtomicUsize,
    failed: AtomicUsize,
    bytes: AtomicU64,
    done: AtomicUsize,
}

/// Hash every digest-less member of every size bucket with two or more
/// members.
///
/// Per-file read errors are logged and counted; the file stays digest-less
/// and cannot match anything in this run.
pub fn hash_candidates(
    index: &SharedIndex,
    hasher: &Hasher,
    config: &HashingConfig,
) -> HashingStats {
    let (candidates, pending): (usize, Vec<(PathBuf, u64)>) = index.read(|idx| {
        let candidates = idx.candidate_paths();
        let pending = candidates
            .iter()
            .filter_map(|path| idx.get(path))
            .filter(|record| !record.is_hashed())
            .map(|record| (record.path.clone(), record.size))
            .collect();
        (candidates.len(), pending)
    });

    let mut stats = HashingStats {
        candidates,
        already_hashed: candidates - pending.len(),
        ..HashingStats::default()
    };

    log::info!(
        "Hashing {} files ({} candidates, {} already hashed)",
        pending.len(),
        stats.candidates,
        stats.already_hashed
    );

    if let Some(ref callback) = config.progress {
        callback.on_phase_start("hashing", pending.len());
    }

    let counters = Counters::default();
    let workers = config.workers.max(1).min(pending.len().max(1));

    if !pending.is_empty() {
        let (tx, rx) = bounded::<(PathBuf, u64)>(config.queue_depth.max(1));

        thread::scope(|scope| {
            for _ in 0..workers {
                let rx = rx.clone();
                let counters = &counters;
                scope.spawn(move || worker(rx, index, hasher, config, counters));
            }
            // Only workers hold receivers, so a send fails once all of them
            // have stopped.
            drop(rx);

            for job in pending {
                if config.is_cancelled() {
                    log::debug!("Hashing: cancellation requested, no more dispatch");
                    break;
                }
                if tx.send(job).is_err() {
                    break;
                }
            }
            drop(tx);
        });
    }

    stats.hashed = counters.hashed.load(Ordering::SeqCst);
    stats.failed = counters.failed.load(Ordering::SeqCst);
    stats.bytes_hashed = counters.bytes.load(Ordering::SeqCst);
    stats.interrupted = config.is_cancelled();

    if let Some(ref callback) = config.progress {
        callback.on_phase_end("hashing");
    }

    log::info!(
        "Hashing complete: {} hashed, {} failed, {} bytes read{}",
        stats.hashed,
        stats.failed,
        stats.bytes_hashed,
        if stats.interrupted { " (interrupted)" } else { "" }
    );
    stats
}

fn worker(
    rx: Receiver<(PathBuf, u64)>,
    index: &SharedIndex,
    hasher: &Hasher,
    config: &HashingConfig,
    counters: &Counters,
) {
    loop {
        if config.is_cancelled() {
            return;
        }
        let Ok((path, size)) = rx.recv() else {
            return;
        };

        match hasher.full_hash(&path) {
            Ok(digest) => {
                log::trace!("{} {}", digest, path.display());
                index.mutate(|idx| idx.set_digest(&path, digest));
                counters.hashed.fetch_add(1, Ordering::SeqCst);
                counters.bytes.fetch_add(size, Ordering::SeqCst);
            }
            Err(e) => {
                log::warn!("Failed to hash {}", e);
                counters.failed.fetch_add(1, Ordering::SeqCst);
            }
        }

        let done = counters.done.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(ref callback) = config.progress {
            callback.on_progress(done, path.to_string_lossy().as_ref());
            callback.on_item_completed(size);
        }
    }
}
