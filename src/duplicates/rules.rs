//! Retention rules deciding which duplicate copies are removed.
//!
//! A [`RetentionPolicy`] combines at most one [`KeepRule`] with an optional
//! delete pattern and an optional keep pattern. For each member of a
//! [`DuplicateGroup`], in path order, the predicates are evaluated in a fixed
//! precedence and the first one that holds marks the member:
//!
//! 1. keep most recent: member is not the most recently modified
//! 2. keep oldest: member is not the least recently modified
//! 3. keep first: member is not first by path
//! 4. keep last: member is not last by path
//! 5. delete pattern: path matches
//! 6. keep pattern: path does not match
//!
//! Marking stops as soon as only one unmarked member would remain, so every
//! group keeps at least one copy no matter how the rules are combined.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::DuplicateGroup;

/// Errors building a retention policy.
#[derive(thiserror::Error, Debug)]
pub enum RuleError {
    /// A pattern is not a valid regular expression.
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Parser error
        #[source]
        source: regex::Error,
    },
}

/// Which single member of a group to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepRule {
    /// Keep the most recently modified copy
    MostRecent,
    /// Keep the least recently modified copy
    Oldest,
    /// Keep the copy whose path sorts first
    FirstByPath,
    /// Keep the copy whose path sorts last
    LastByPath,
}

impl fmt::Display for KeepRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MostRecent => write!(f, "keep most recent"),
            Self::Oldest => write!(f, "keep oldest"),
            Self::FirstByPath => write!(f, "keep first"),
            Self::LastByPath => write!(f, "keep last"),
        }
    }
}

/// Why a member was marked for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkReason {
    /// A newer copy exists
    NotMostRecent,
    /// An older copy exists
    NotOldest,
    /// Another copy sorts first
    NotFirst,
    /// Another copy sorts last
    NotLast,
    /// Path matches the delete pattern
    MatchesDeletePattern,
    /// Path does not match the keep pattern
    MissesKeepPattern,
}

impl fmt::Display for MarkReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotMostRecent => "newer copy exists",
            Self::NotOldest => "older copy exists",
            Self::NotFirst => "not first by path",
            Self::NotLast => "not last by path",
            Self::MatchesDeletePattern => "matches delete pattern",
            Self::MissesKeepPattern => "outside keep pattern",
        };
        f.write_str(text)
    }
}

/// A member selected for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    /// Position in [`DuplicateGroup::members`]
    pub index: usize,
    /// First predicate that held
    pub reason: MarkReason,
}

/// Configured rule set.
#[derive(Debug, Clone, Default)]
pub struct RetentionPolicy {
    /// Keep exactly one member chosen by this rule
    pub keep: Option<KeepRule>,
    /// Remove members whose path matches
    pub delete_pattern: Option<Regex>,
    /// Remove members whose path does not match
    pub keep_pattern: Option<Regex>,
}

fn compile(pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

impl RetentionPolicy {
    /// A policy that marks nothing.
    #[must_use]
    pub fn report_only() -> Self {
        Self::default()
    }

    /// Set the keep rule.
    #[must_use]
    pub fn with_keep(mut self, rule: KeepRule) -> Self {
        self.keep = Some(rule);
        self
    }

    /// Set the delete pattern.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::InvalidPattern`] if `pattern` does not compile.
    pub fn with_delete_pattern(mut self, pattern: &str) -> Result<Self, RuleError> {
        self.delete_pattern = Some(compile(pattern)?);
        Ok(self)
    }

    /// Set the keep pattern.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::InvalidPattern`] if `pattern` does not compile.
    pub fn with_keep_pattern(mut self, pattern: &str) -> Result<Self, RuleError> {
        self.keep_pattern = Some(compile(pattern)?);
        Ok(self)
    }

    /// Whether any rule is configured.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.keep.is_some() || self.delete_pattern.is_some() || self.keep_pattern.is_some()
    }

    /// First predicate that marks the member at `index`, if any.
    #[must_use]
    pub fn evaluate(&self, group: &DuplicateGroup, index: usize) -> Option<MarkReason> {
        let last = group.len().checked_sub(1)?;
        let member = group.members().get(index)?;

        match self.keep {
            Some(KeepRule::MostRecent) if index != group.most_recent() => {
                return Some(MarkReason::NotMostRecent)
            }
            Some(KeepRule::Oldest) if index != group.oldest() => {
                return Some(MarkReason::NotOldest)
            }
            Some(KeepRule::FirstByPath) if index != 0 => return Some(MarkReason::NotFirst),
            Some(KeepRule::LastByPath) if index != last => return Some(MarkReason::NotLast),
            _ => {}
        }

        let path = member.path.to_string_lossy();
        if self
            .delete_pattern
            .as_ref()
            .is_some_and(|re| re.is_match(&path))
        {
            return Some(MarkReason::MatchesDeletePattern);
        }
        if self
            .keep_pattern
            .as_ref()
            .is_some_and(|re| !re.is_match(&path))
        {
            return Some(MarkReason::MissesKeepPattern);
        }
        None
    }

    /// Members to remove from `group`, in path order.
    ///
    /// Never marks every member: evaluation stops once a single unmarked
    /// member would remain.
    #[must_use]
    pub fn plan(&self, group: &DuplicateGroup) -> Vec<Mark> {
        let mut marks = Vec::new();
        if !self.is_active() {
            return marks;
        }

        for index in 0..group.len() {
            if group.len() - marks.len() < 2 {
                break;
            }
            if let Some(reason) = self.evaluate(group, index) {
                marks.push(Mark { index, reason });
            }
        }
        marks
    }

    /// Short human-readable description, e.g. for reports.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(rule) = self.keep {
            parts.push(rule.to_string());
        }
        if let Some(ref re) = self.delete_pattern {
            parts.push(format!("delete matching '{}'", re.as_str()));
        }
        if let Some(ref re) = self.keep_pattern {
            parts.push(format!("keep matching '{}'", re.as_str()));
        }
        if parts.is_empty() {
            "report only".to_string()
        } else {
            parts.join(", ")
        }
    }
}
