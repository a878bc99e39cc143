//! Report formatters for a finished or stopped run.
//!
//! - [`TextOutput`]: colored listing of every duplicate group plus a summary
//! - [`JsonOutput`]: the same data as one JSON document
//!
//! # Example
//!
//! ```no_run
//! use dupekeep::cli::OutputFormat;
//! use dupekeep::duplicates::{DuplicateFinder, FinderConfig};
//! use dupekeep::output::write_report;
//! use std::path::PathBuf;
//!
//! let report = DuplicateFinder::new(FinderConfig::new(vec![PathBuf::from(".")]))
//!     .run()
//!     .unwrap();
//! write_report(&report, OutputFormat::Json, false, &mut std::io::stdout()).unwrap();
//! ```

pub mod json;
pub mod text;

use std::io::Write;

pub use json::JsonOutput;
pub use text::TextOutput;

use crate::cli::OutputFormat;
use crate::duplicates::RunReport;

/// Errors that can occur while writing a report.
#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error while writing report: {0}")]
    Io(#[from] std::io::Error),
}

/// Write `report` to `writer` in the requested format.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_report<W: Write>(
    report: &RunReport,
    format: OutputFormat,
    color: bool,
    writer: &mut W,
) -> Result<(), OutputError> {
    match format {
        OutputFormat::Text => TextOutput::new(report).with_color(color).write_to(writer)?,
        OutputFormat::Json => JsonOutput::new(report).write_to(writer, true)?,
    }
    Ok(())
}
