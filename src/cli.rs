//! Command-line interface definitions for dupekeep.
//!
//! # Example
//!
//! ```bash
//! # Report duplicates under two trees, remembering what was hashed
//! dupekeep -d ~/.cache/dupekeep.json ~/Photos /mnt/backup/Photos
//!
//! # Keep the copy with the lowest path, delete the rest
//! dupekeep --keep-first ~/Downloads
//!
//! # Only refresh the persisted index
//! dupekeep --index-only -d index.json /srv/data
//!
//! # Re-run enforcement over the persisted index alone
//! dupekeep -d index.json --keep-match '/important/' --dry-run
//! ```

use clap::builder::RangedU64ValueParser;
use clap::{ArgGroup, Parser, ValueEnum};
use std::path::PathBuf;

use crate::duplicates::KeepRule;

/// Incremental duplicate file finder with rule-based retention.
///
/// Files are compared by xxh3 digest of their full content. Hashes are kept
/// in an optional persisted index, so unchanged files are never read twice.
#[derive(Debug, Parser)]
#[command(name = "dupekeep")]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("keep")
        .args(["keep_recent", "keep_oldest", "keep_first", "keep_last"])
        .multiple(false)
))]
pub struct Cli {
    /// Directory trees to index
    #[arg(value_name = "PATHS")]
    pub paths: Vec<PathBuf>,

    /// Persisted index to load and save
    #[arg(short, long, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Update the index without applying any retention rule
    #[arg(long)]
    pub index_only: bool,

    /// Number of hashing threads (default: available parallelism)
    #[arg(
        short = 'j',
        long,
        value_name = "N",
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub workers: Option<usize>,

    /// In each duplicate group keep only the most recently modified copy
    #[arg(long)]
    pub keep_recent: bool,

    /// In each duplicate group keep only the oldest copy
    #[arg(long)]
    pub keep_oldest: bool,

    /// In each duplicate group keep only the lexically first path
    #[arg(long)]
    pub keep_first: bool,

    /// In each duplicate group keep only the lexically last path
    #[arg(long)]
    pub keep_last: bool,

    /// Delete duplicates whose path matches this regex
    #[arg(long, value_name = "REGEX")]
    pub delete_match: Option<String>,

    /// Delete duplicates whose path does not match this regex
    #[arg(long, value_name = "REGEX")]
    pub keep_match: Option<String>,

    /// Report what would be deleted without touching any file
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Move deleted files to the system trash
    #[arg(long)]
    pub trash: bool,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Print errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,

    /// Configuration file (default: platform config dir)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,
}

impl Cli {
    /// The keep-rule selected on the command line, if any.
    #[must_use]
    pub fn keep_rule(&self) -> Option<KeepRule> {
        if self.keep_recent {
            Some(KeepRule::MostRecent)
        } else if self.keep_oldest {
            Some(KeepRule::Oldest)
        } else if self.keep_first {
            Some(KeepRule::FirstByPath)
        } else if self.keep_last {
            Some(KeepRule::LastByPath)
        } else {
            None
        }
    }
}

/// Report format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
