//! JSON report for scripting.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "groups": [
//!     {
//!       "digest": "9f2c61b0d3e4a5c7",
//!       "size": 1024,
//!       "members": [
//!         { "path": "/a/1.txt", "modified": "2026-01-02T03:04:05Z", "action": "keep" },
//!         { "path": "/b/2.txt", "modified": "2026-01-02T03:04:05Z",
//!           "action": "deleted", "reason": "not_first" }
//!       ]
//!     }
//!   ],
//!   "summary": { "stage": "done", "stopped": false, "duplicate_groups": 1, ... },
//!   "exit_code": 0,
//!   "exit_code_name": "DK000"
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use crate::duplicates::{GroupReport, RunReport, RunSummary};
use crate::error::ExitCode;

use super::OutputError;

/// Complete JSON document for one run.
#[derive(Debug, Serialize)]
pub struct JsonOutput<'a> {
    /// Duplicate groups in ascending digest order
    pub groups: &'a [GroupReport],
    /// Per-stage statistics
    pub summary: &'a RunSummary,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DK000")
    pub exit_code_name: &'static str,
}

impl<'a> JsonOutput<'a> {
    /// Wrap a run report.
    #[must_use]
    pub fn new(report: &'a RunReport) -> Self {
        let exit_code = ExitCode::from_summary(&report.summary);
        Self {
            groups: &report.groups,
            summary: &report.summary,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix(),
        }
    }

    /// Serialize to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the document followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), OutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}
