//! Duplicate detection and retention.
//!
//! This module provides functionality for:
//! - Concurrent hashing of same-size candidates ([`hashing`])
//! - Deterministic snapshots of duplicate buckets ([`groups`])
//! - Retention rules deciding which copies go ([`rules`])
//! - Applying those rules and deleting files ([`enforce`])
//! - Orchestrating a complete run ([`finder`])

pub mod enforce;
pub mod finder;
pub mod groups;
pub mod hashing;
pub mod rules;

pub use enforce::{
    enforce, report_groups, EnforceConfig, Enforcement, EnforcementStats, GroupReport,
    MemberAction, MemberReport,
};
pub use finder::{
    format_duration, DuplicateFinder, FinderConfig, FinderError, Mode, RunReport, RunSummary,
    Stage,
};
pub use groups::{duplicate_groups, DuplicateGroup};
pub use hashing::{default_workers, hash_candidates, HashingConfig, HashingStats};
pub use rules::{KeepRule, Mark, MarkReason, RetentionPolicy, RuleError};
