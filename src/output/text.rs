//! Human-readable report.
//!
//! Each duplicate group is listed with one line per member and the action
//! taken on it, followed by a summary of every stage:
//!
//! ```text
//! Found 3 elements for digest 9f2c61b0d3e4a5c7 (1.0 KiB each)
//!   keep          /a/1.txt
//!   deleted       /b/2.txt  (not first by path)
//!   deleted       /c/3.txt  (not first by path)
//! ```

use std::io::{self, Write};

use bytesize::ByteSize;
use yansi::{Condition, Paint, Painted};

use crate::duplicates::{format_duration, GroupReport, MemberAction, RunReport, Stage};

/// Text renderer for a run report.
#[derive(Debug)]
pub struct TextOutput<'a> {
    report: &'a RunReport,
    color: bool,
}

impl<'a> TextOutput<'a> {
    /// Wrap a run report. Colors are on by default.
    #[must_use]
    pub fn new(report: &'a RunReport) -> Self {
        Self {
            report,
            color: true,
        }
    }

    /// Enable or disable ANSI colors.
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn paint<'p, T: ?Sized>(&self, painted: Painted<&'p T>) -> Painted<&'p T> {
        painted.whenever(if self.color {
            Condition::ALWAYS
        } else {
            Condition::NEVER
        })
    }

    /// Write the report.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for group in &self.report.groups {
            self.write_group(writer, group)?;
        }
        self.write_summary(writer)
    }

    fn write_group<W: Write>(&self, w: &mut W, group: &GroupReport) -> io::Result<()> {
        writeln!(
            w,
            "Found {} elements for digest {} ({} each)",
            self.paint(group.members.len().bold()),
            self.paint(group.digest.cyan()),
            ByteSize(group.size)
        )?;

        for member in &group.members {
            let path = member.path.display().to_string();
            match &member.action {
                MemberAction::Keep => {
                    writeln!(w, "  {:<12}  {}", self.paint("keep".green()), path)?;
                }
                MemberAction::WouldDelete { reason } => {
                    writeln!(
                        w,
                        "  {:<12}  {}  ({})",
                        self.paint("would delete".yellow()),
                        path,
                        reason
                    )?;
                }
                MemberAction::Deleted { reason } => {
                    writeln!(w, "  {:<12}  {}  ({})", self.paint("deleted".red()), path, reason)?;
                }
                MemberAction::Failed { reason, error } => {
                    writeln!(
                        w,
                        "  {:<12}  {}  ({}; {})",
                        self.paint("failed".red().bold()),
                        path,
                        reason,
                        error
                    )?;
                }
                MemberAction::Skipped { reason } => {
                    writeln!(
                        w,
                        "  {:<12}  {}  ({}; not processed)",
                        self.paint("skipped".dim()),
                        path,
                        reason
                    )?;
                }
            }
        }
        writeln!(w)
    }

    fn write_summary<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let s = &self.report.summary;

        writeln!(w, "{}", self.paint("Summary".bold()))?;
        writeln!(
            w,
            "  Indexed files:     {} ({} new, {} loaded)",
            s.indexed_files, s.walk.new_files, s.loaded
        )?;
        if s.loaded > 0 {
            writeln!(
                w,
                "  Validated:         {} unchanged, {} changed, {} removed",
                s.validation.unchanged, s.validation.rehomed, s.validation.removed
            )?;
        }
        writeln!(
            w,
            "  Hashed:            {} files ({}), {} reused, {} failed",
            s.hashing.hashed,
            ByteSize(s.hashing.bytes_hashed),
            s.hashing.already_hashed,
            s.hashing.failed
        )?;
        writeln!(
            w,
            "  Duplicate groups:  {} ({} reclaimable)",
            s.duplicate_groups,
            ByteSize(s.reclaimable)
        )?;

        if let Some(e) = s.enforcement {
            if e.dry_run_selected > 0 {
                writeln!(
                    w,
                    "  Would remove:      {} files (dry run)",
                    self.paint(e.dry_run_selected.yellow())
                )?;
            }
            if e.removed > 0 || e.failed > 0 || e.dry_run_selected == 0 {
                writeln!(
                    w,
                    "  Removed:           {} files ({} freed)",
                    e.removed,
                    ByteSize(e.bytes_freed)
                )?;
            }
            if e.failed > 0 {
                writeln!(
                    w,
                    "  Failed removals:   {}",
                    self.paint(e.failed.red().bold())
                )?;
            }
        }

        if s.walk.errors > 0 {
            writeln!(w, "  Walk errors:       {}", s.walk.errors)?;
        }
        if s.persisted {
            writeln!(w, "  Index saved:       yes")?;
        }
        writeln!(w, "  Duration:          {}", format_duration(s.duration_ms))?;

        if s.stopped {
            writeln!(
                w,
                "{}",
                self.paint("Run stopped before completion; results are partial.".yellow())
            )?;
        } else if s.stage != Stage::Done {
            writeln!(w, "  Last stage:        {:?}", s.stage)?;
        }
        Ok(())
    }
}
