//! Applying a retention policy to every duplicate group.
//!
//! Groups are visited in ascending digest order and members in path order,
//! so two runs over the same index make the same decisions. Each group is
//! snapshotted before any of its members is touched; deletions only change
//! the index, never the snapshot being evaluated. The index is the same
//! [`SharedIndex`] the hashing stage filled, so every change to it goes
//! through one lock.
//!
//! Cancellation is polled before each marked member. In dry-run mode the
//! marked members are counted and reported but nothing on disk changes.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::actions::{DeleteOutcome, Deleter};
use crate::index::{FileIndex, SharedIndex};
use crate::progress::ProgressCallback;
use crate::scanner::Digest;
use crate::signal::CancellationToken;

use super::groups::{duplicate_groups, DuplicateGroup};
use super::rules::{MarkReason, RetentionPolicy};

/// Configuration for the enforcement stage.
#[derive(Clone, Default)]
pub struct EnforceConfig {
    /// Rules deciding which copies go
    pub policy: RetentionPolicy,
    /// How marked copies are removed
    pub deleter: Deleter,
    /// Only report what would be removed
    pub dry_run: bool,
    /// Cooperative cancellation
    pub cancel: Option<CancellationToken>,
    /// Optional progress callback
    pub progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for EnforceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnforceConfig")
            .field("policy", &self.policy)
            .field("deleter", &self.deleter)
            .field("dry_run", &self.dry_run)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl EnforceConfig {
    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Counters for one enforcement stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnforcementStats {
    /// Duplicate groups visited
    pub buckets: usize,
    /// Members marked and processed
    pub marked: usize,
    /// Files actually removed
    pub removed: usize,
    /// Removals that left the file on disk
    pub failed: usize,
    /// Files that would have been removed in dry-run mode
    pub dry_run_selected: usize,
    /// Bytes freed by removals
    pub bytes_freed: u64,
}

/// Action taken for one group member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MemberAction {
    /// Not selected by any rule
    Keep,
    /// Selected, but this is a dry run
    WouldDelete {
        /// Why it was selected
        reason: MarkReason,
    },
    /// Selected and removed
    Deleted {
        /// Why it was selected
        reason: MarkReason,
    },
    /// Selected, but removal failed
    Failed {
        /// Why it was selected
        reason: MarkReason,
        /// What went wrong
        error: String,
    },
    /// Selected, but the run stopped before it was processed
    Skipped {
        /// Why it was selected
        reason: MarkReason,
    },
}

/// One member of a reported group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberReport {
    /// File path
    pub path: PathBuf,
    /// Modification time
    pub modified: DateTime<Utc>,
    /// What happened to it
    #[serde(flatten)]
    pub action: MemberAction,
}

/// A duplicate group and what was done to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    /// Shared content digest
    pub digest: Digest,
    /// Size of each member
    pub size: u64,
    /// Members in path order
    pub members: Vec<MemberReport>,
}

impl GroupReport {
    /// Report a group without applying any rule.
    #[must_use]
    pub fn unenforced(group: &DuplicateGroup) -> Self {
        Self {
            digest: group.digest(),
            size: group.size(),
            members: group
                .members()
                .iter()
                .map(|m| MemberReport {
                    path: m.path.clone(),
                    modified: DateTime::<Utc>::from(m.modified),
                    action: MemberAction::Keep,
                })
                .collect(),
        }
    }

    /// Number of members still on disk after enforcement.
    #[must_use]
    pub fn survivors(&self) -> usize {
        self.members
            .iter()
            .filter(|m| !matches!(m.action, MemberAction::Deleted { .. }))
            .count()
    }
}

/// Result of an enforcement stage.
#[derive(Debug, Clone, Default)]
pub struct Enforcement {
    /// Counters
    pub stats: EnforcementStats,
    /// Per-group report, in ascending digest order
    pub groups: Vec<GroupReport>,
    /// Whether cancellation cut the stage short
    pub interrupted: bool,
}

/// Report every duplicate group in `index` without changing anything.
#[must_use]
pub fn report_groups(index: &FileIndex) -> Vec<GroupReport> {
    duplicate_groups(index)
        .iter()
        .map(GroupReport::unenforced)
        .collect()
}

/// Apply `config.policy` to every duplicate group in `index`.
pub fn enforce(index: &SharedIndex, config: &EnforceConfig) -> Enforcement {
    let groups = index.read(duplicate_groups);
    let mut result = Enforcement::default();

    log::info!(
        "Applying retention policy ({}) to {} duplicate groups{}",
        config.policy.describe(),
        groups.len(),
        if config.dry_run { " [dry run]" } else { "" }
    );

    if let Some(ref callback) = config.progress {
        callback.on_phase_start("enforcing", groups.len());
    }

    for (position, group) in groups.iter().enumerate() {
        if result.interrupted {
            break;
        }
        result.stats.buckets += 1;

        log::debug!(
            "Found {} elements for digest {}",
            group.len(),
            group.digest()
        );

        let mut report = GroupReport::unenforced(group);
        for mark in config.policy.plan(group) {
            let member = &group.members()[mark.index];
            let reason = mark.reason;

            if result.interrupted || config.is_cancelled() {
                result.interrupted = true;
                report.members[mark.index].action = MemberAction::Skipped { reason };
                continue;
            }
            result.stats.marked += 1;

            let action = if config.dry_run {
                log::info!("Would delete {} ({})", member.path.display(), reason);
                result.stats.dry_run_selected += 1;
                MemberAction::WouldDelete { reason }
            } else {
                match config.deleter.delete(index, &member.path) {
                    DeleteOutcome::Removed { size } => {
                        result.stats.removed += 1;
                        result.stats.bytes_freed += size;
                        MemberAction::Deleted { reason }
                    }
                    DeleteOutcome::Failed(e) => {
                        result.stats.failed += 1;
                        MemberAction::Failed {
                            reason,
                            error: e.to_string(),
                        }
                    }
                }
            };
            report.members[mark.index].action = action;
        }
        result.groups.push(report);

        if let Some(ref callback) = config.progress {
            callback.on_progress(position + 1, &group.digest().to_string());
        }
    }

    if let Some(ref callback) = config.progress {
        callback.on_phase_end("enforcing");
    }

    log::info!(
        "Enforcement complete: {} marked, {} removed, {} failed{}",
        result.stats.marked,
        result.stats.removed,
        result.stats.failed,
        if result.interrupted { " (interrupted)" } else { "" }
    );
    result
}
