//! Structured error handling and exit codes.

use serde::Serialize;

use crate::duplicates::RunSummary;

/// Process exit codes.
///
/// - 0: Success (run completed)
/// - 1: General error (bad arguments, corrupt or unwritable index, ...)
/// - 3: Partial success (run completed but some deletions failed)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the run completed.
    Success = 0,
    /// General error: the run could not be completed.
    GeneralError = 1,
    /// Partial success: the run completed but some files could not be removed.
    PartialSuccess = 3,
    /// Interrupted: the run was stopped by the user.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Exit code for a finished or stopped run.
    #[must_use]
    pub fn from_summary(summary: &RunSummary) -> Self {
        if summary.stopped {
            Self::Interrupted
        } else if summary.has_failures() {
            Self::PartialSuccess
        } else {
            Self::Success
        }
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DK000",
            Self::GeneralError => "DK001",
            Self::PartialSuccess => "DK003",
            Self::Interrupted => "DK130",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DK001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the run was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
