//! Run orchestration: load, validate, walk, hash, enforce, persist.
//!
//! # Overview
//!
//! [`DuplicateFinder::run`] drives one run through these stages:
//!
//! ```text
//! Idle -> Loaded -> Indexed -> Hashed -> [Enforced] -> [Persisted] -> Done
//! ```
//!
//! - **Loaded**: the persisted index is read (a missing store means an empty
//!   index) and validated against the filesystem
//! - **Indexed**: the roots are walked and new files added
//! - **Hashed**: every same-size candidate has a digest
//! - **Enforced**: the retention policy was applied (skipped in index-only
//!   mode)
//! - **Persisted**: the index was written back (skipped without a store)
//!
//! A store that exists but cannot be decoded aborts the run before any work
//! and is left untouched. Once loading succeeded, a cancellation at any
//! point ends the run with [`FinderError::Stopped`]; if a store is
//! configured, what has been confirmed so far is still saved.
//!
//! # Example
//!
//! ```no_run
//! use dupekeep::duplicates::{DuplicateFinder, FinderConfig, KeepRule, RetentionPolicy};
//! use std::path::PathBuf;
//!
//! let config = FinderConfig::new(vec![PathBuf::from("/data")])
//!     .with_store(PathBuf::from("/var/lib/dupekeep/index.json"))
//!     .with_policy(RetentionPolicy::default().with_keep(KeepRule::FirstByPath))
//!     .with_dry_run(true);
//!
//! let report = DuplicateFinder::new(config).run().unwrap();
//! println!("{} duplicate groups", report.summary.duplicate_groups);
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::actions::{DeleteMethod, Deleter};
use crate::index::{FileIndex, IndexStore, SharedIndex, StoreError};
use crate::progress::ProgressCallback;
use crate::scanner::{
    validate_index, Hasher, ValidationStats, WalkError, WalkStats, Walker,
    DEFAULT_MMAP_THRESHOLD,
};
use crate::signal::CancellationToken;

use super::enforce::{enforce, report_groups, EnforceConfig, EnforcementStats, GroupReport};
use super::hashing::{
    default_workers, hash_candidates, HashingConfig, HashingStats, DEFAULT_QUEUE_DEPTH,
};
use super::rules::RetentionPolicy;

/// What a run does after hashing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Apply the retention policy
    #[default]
    Enforce,
    /// Only bring the index up to date
    IndexOnly,
}

/// Stages of a run, in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Nothing done yet
    #[default]
    Idle,
    /// Persisted index loaded and validated
    Loaded,
    /// Roots walked
    Indexed,
    /// Candidates hashed
    Hashed,
    /// Retention policy applied
    Enforced,
    /// Index written back
    Persisted,
    /// Run finished
    Done,
}

/// Configuration for a run.
#[derive(Clone)]
pub struct FinderConfig {
    /// Directory trees to walk
    pub roots: Vec<PathBuf>,
    /// Persisted index location
    pub store: Option<PathBuf>,
    /// Enforce or index only
    pub mode: Mode,
    /// Hashing worker count
    pub workers: usize,
    /// Hashing queue capacity
    pub queue_depth: usize,
    /// Memory-map large files while hashing (off by default)
    pub use_mmap: bool,
    /// Size at which files are memory-mapped
    pub mmap_threshold: u64,
    /// Retention rules
    pub policy: RetentionPolicy,
    /// Report instead of deleting
    pub dry_run: bool,
    /// Permanent or trash
    pub delete_method: DeleteMethod,
    /// Cooperative cancellation
    pub cancel: Option<CancellationToken>,
    /// Optional progress callback
    pub progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("roots", &self.roots)
            .field("store", &self.store)
            .field("mode", &self.mode)
            .field("workers", &self.workers)
            .field("queue_depth", &self.queue_depth)
            .field("use_mmap", &self.use_mmap)
            .field("mmap_threshold", &self.mmap_threshold)
            .field("policy", &self.policy)
            .field("dry_run", &self.dry_run)
            .field("delete_method", &self.delete_method)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            store: None,
            mode: Mode::default(),
            workers: default_workers(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            use_mmap: false,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
            policy: RetentionPolicy::default(),
            dry_run: false,
            delete_method: DeleteMethod::default(),
            cancel: None,
            progress: None,
        }
    }
}

impl FinderConfig {
    /// Configuration for walking `roots` with defaults for everything else.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            ..Self::default()
        }
    }

    /// Load from and save to `path`.
    #[must_use]
    pub fn with_store(mut self, path: PathBuf) -> Self {
        self.store = Some(path);
        self
    }

    /// Set the mode.
    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the number of hashing workers.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the hashing queue capacity.
    #[must_use]
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Enable or disable memory-mapped hashing.
    #[must_use]
    pub fn with_mmap(mut self, enabled: bool) -> Self {
        self.use_mmap = enabled;
        self
    }

    /// Set the size at which files are memory-mapped.
    #[must_use]
    pub fn with_mmap_threshold(mut self, threshold: u64) -> Self {
        self.mmap_threshold = threshold;
        self
    }

    /// Set the retention policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetentionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable or disable dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set how marked files are removed.
    #[must_use]
    pub fn with_delete_method(mut self, method: DeleteMethod) -> Self {
        self.delete_method = method;
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

/// Per-stage statistics of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Last stage reached
    pub stage: Stage,
    /// Whether the run was cancelled
    pub stopped: bool,
    /// Records read from the store
    pub loaded: usize,
    /// Validation counters
    pub validation: ValidationStats,
    /// Walk counters
    pub walk: WalkStats,
    /// Hashing counters
    pub hashing: HashingStats,
    /// Enforcement counters, if the stage ran
    pub enforcement: Option<EnforcementStats>,
    /// Duplicate groups found
    pub duplicate_groups: usize,
    /// Bytes held by redundant copies before enforcement
    pub reclaimable: u64,
    /// Records in the index at the end of the run
    pub indexed_files: usize,
    /// Whether the index was written back
    pub persisted: bool,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl RunSummary {
    /// Whether any deletion failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.enforcement.is_some_and(|e| e.failed > 0)
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Statistics
    pub summary: RunSummary,
    /// Duplicate groups and what happened to their members
    pub groups: Vec<GroupReport>,
}

/// Errors that end a run.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// Cancellation was requested. Carries what was done until then.
    #[error("Run stopped by user")]
    Stopped {
        /// Partial results
        report: Box<RunReport>,
    },

    /// The persisted index could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Orchestrates a complete run.
#[derive(Debug)]
pub struct DuplicateFinder {
    config: FinderConfig,
    hasher: Hasher,
}

impl DuplicateFinder {
    /// Create a finder for `config`.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let hasher = Hasher::new()
            .with_mmap(config.use_mmap)
            .with_mmap_threshold(config.mmap_threshold);
        Self { config, hasher }
    }

    /// The configuration this finder runs with.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Run every stage.
    ///
    /// # Errors
    ///
    /// - [`FinderError::Store`] if the store is corrupt or unreadable (no
    ///   work is done and the store is not overwritten), or if writing it
    ///   back fails
    /// - [`FinderError::Stopped`] if cancellation was observed
    pub fn run(&self) -> Result<RunReport, FinderError> {
        let start = Instant::now();
        let mut report = RunReport::default();
        let store = self.config.store.as_ref().map(IndexStore::new);

        let mut index = match store {
            Some(ref store) => match store.read() {
                Ok(index) => {
                    log::info!(
                        "Loaded {} indexed files from {}",
                        index.len(),
                        store.path().display()
                    );
                    index
                }
                Err(e) if e.is_not_found() => {
                    log::info!(
                        "No index at {}, starting fresh",
                        store.path().display()
                    );
                    FileIndex::new()
                }
                Err(e) => return Err(FinderError::Store(e)),
            },
            None => FileIndex::new(),
        };
        report.summary.loaded = index.len();

        report.summary.validation = validate_index(&mut index);
        report.summary.stage = Stage::Loaded;
        if self.config.is_cancelled() {
            return Err(self.stop(report, &index, store.as_ref(), start));
        }

        let walker = self.walker();
        match walker.walk(&mut index) {
            Ok(stats) => report.summary.walk = stats,
            Err(WalkError::Stopped { stats }) => {
                report.summary.walk = stats;
                return Err(self.stop(report, &index, store.as_ref(), start));
            }
        }
        report.summary.stage = Stage::Indexed;

        // From here on every change goes through the one lock: hashing
        // workers and the deletion pass share it.
        let shared = SharedIndex::new(index);
        report.summary.hashing = hash_candidates(&shared, &self.hasher, &self.hashing_config());
        if report.summary.hashing.interrupted {
            return Err(self.stop(report, &shared.into_inner(), store.as_ref(), start));
        }
        report.summary.stage = Stage::Hashed;

        let groups = shared.read(report_groups);
        report.summary.duplicate_groups = groups.len();
        report.summary.reclaimable = groups
            .iter()
            .map(|g| g.size * (g.members.len() as u64 - 1))
            .sum();
        log::info!(
            "Found {} duplicate groups ({} reclaimable)",
            report.summary.duplicate_groups,
            bytesize::ByteSize(report.summary.reclaimable)
        );

        match self.config.mode {
            Mode::IndexOnly => report.groups = groups,
            Mode::Enforce => {
                let enforcement = enforce(&shared, &self.enforce_config());
                report.summary.enforcement = Some(enforcement.stats);
                report.groups = enforcement.groups;
                if enforcement.interrupted {
                    return Err(self.stop(report, &shared.into_inner(), store.as_ref(), start));
                }
                report.summary.stage = Stage::Enforced;
            }
        }
        let index = shared.into_inner();

        if let Some(ref store) = store {
            store.write(&index)?;
            report.summary.persisted = true;
            report.summary.stage = Stage::Persisted;
            log::info!(
                "Saved {} indexed files to {}",
                index.len(),
                store.path().display()
            );
        }

        report.summary.indexed_files = index.len();
        report.summary.stage = Stage::Done;
        report.summary.duration_ms = elapsed_ms(start);
        Ok(report)
    }

    fn stop(
        &self,
        mut report: RunReport,
        index: &FileIndex,
        store: Option<&IndexStore>,
        start: Instant,
    ) -> FinderError {
        log::info!("Run stopped during {:?} stage", next_stage(report.summary.stage));

        if let Some(store) = store {
            match store.write(index) {
                Ok(()) => {
                    report.summary.persisted = true;
                    log::info!("Saved partial index to {}", store.path().display());
                }
                Err(e) => log::warn!("Could not save partial index: {}", e),
            }
        }

        report.summary.stopped = true;
        report.summary.indexed_files = index.len();
        report.summary.duration_ms = elapsed_ms(start);
        FinderError::Stopped {
            report: Box::new(report),
        }
    }

    fn walker(&self) -> Walker {
        let mut walker = Walker::new(self.config.roots.clone());
        if let Some(ref token) = self.config.cancel {
            walker = walker.with_cancellation(token.clone());
        }
        if let Some(ref callback) = self.config.progress {
            walker = walker.with_progress(callback.clone());
        }
        walker
    }

    fn hashing_config(&self) -> HashingConfig {
        HashingConfig {
            workers: self.config.workers,
            queue_depth: self.config.queue_depth,
            cancel: self.config.cancel.clone(),
            progress: self.config.progress.clone(),
        }
    }

    fn enforce_config(&self) -> EnforceConfig {
        EnforceConfig {
            policy: self.config.policy.clone(),
            deleter: Deleter::new(self.config.delete_method),
            dry_run: self.config.dry_run,
            cancel: self.config.cancel.clone(),
            progress: self.config.progress.clone(),
        }
    }
}

fn next_stage(stage: Stage) -> Stage {
    match stage {
        Stage::Idle => Stage::Loaded,
        Stage::Loaded => Stage::Indexed,
        Stage::Indexed => Stage::Hashed,
        Stage::Hashed => Stage::Enforced,
        Stage::Enforced => Stage::Persisted,
        Stage::Persisted | Stage::Done => Stage::Done,
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Render a millisecond duration for humans.
#[must_use]
pub fn format_duration(ms: u64) -> String {
    let d = Duration::from_millis(ms);
    if d.as_secs() >= 60 {
        format!("{}m {:02}s", d.as_secs() / 60, d.as_secs() % 60)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}
