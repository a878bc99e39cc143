//! dupekeep - incremental duplicate file finder with rule-based retention.
//!
//! Files under one or more directory trees are grouped by size, same-size
//! candidates are fingerprinted with xxh3, and each group of byte-identical
//! files is put through a retention policy that never removes the last copy.
//! Digests are persisted between runs and only recomputed for files whose
//! modification time changed.

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod index;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use anyhow::{bail, Context};

use crate::actions::DeleteMethod;
use crate::cli::Cli;
use crate::config::Config;
use crate::duplicates::{
    default_workers, DuplicateFinder, FinderConfig, FinderError, Mode, RetentionPolicy, RunReport,
};
use crate::error::ExitCode;
use crate::output::write_report;
use crate::progress::Progress;

/// Combine command-line flags with the loaded configuration.
///
/// Flags win over configuration values. Fails if neither paths nor a
/// database are given, if index-only mode lacks either, or if a pattern does
/// not compile.
///
/// # Errors
///
/// Returns an error describing the invalid combination.
pub fn finder_config(cli: &Cli, config: &Config) -> anyhow::Result<FinderConfig> {
    let database = cli.database.clone().or_else(|| config.database.clone());

    if cli.paths.is_empty() && database.is_none() {
        bail!("Nothing to do: give at least one path or a --database");
    }
    if cli.index_only && (database.is_none() || cli.paths.is_empty()) {
        bail!("--index-only requires --database and at least one path");
    }

    let mut policy = RetentionPolicy::report_only();
    if let Some(rule) = cli.keep_rule() {
        policy = policy.with_keep(rule);
    }
    if let Some(ref pattern) = cli.delete_match {
        policy = policy.with_delete_pattern(pattern)?;
    }
    if let Some(ref pattern) = cli.keep_match {
        policy = policy.with_keep_pattern(pattern)?;
    }

    let mode = if cli.index_only {
        Mode::IndexOnly
    } else {
        Mode::Enforce
    };
    let delete_method = if cli.trash || config.trash {
        DeleteMethod::Trash
    } else {
        DeleteMethod::Permanent
    };

    let mut finder = FinderConfig::new(cli.paths.clone())
        .with_mode(mode)
        .with_workers(cli.workers.or(config.workers).unwrap_or_else(default_workers))
        .with_queue_depth(config.queue_depth)
        .with_mmap(config.mmap)
        .with_mmap_threshold(config.mmap_threshold)
        .with_policy(policy)
        .with_dry_run(cli.dry_run || config.dry_run)
        .with_delete_method(delete_method);
    if let Some(path) = database {
        finder = finder.with_store(path);
    }
    Ok(finder)
}

/// Run the application for parsed command-line arguments.
///
/// The report is printed to stdout, also for a stopped run.
///
/// # Errors
///
/// Returns an error for invalid arguments, a corrupt or unreadable index,
/// or a failure to write the index or the report.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::load(cli.config.as_deref());
    log::debug!("Effective configuration: {:?}", config);

    let mut finder_config = finder_config(&cli, &config)?;
    if finder_config.mode == Mode::Enforce && !finder_config.policy.is_active() {
        log::info!("No retention rule given, reporting only");
    } else if finder_config.mode == Mode::Enforce {
        log::info!("Retention policy: {}", finder_config.policy.describe());
    }

    let token = signal::install_handler().context("Failed to install signal handler")?;
    finder_config = finder_config
        .with_cancellation(token)
        .with_progress(Arc::new(Progress::new(cli.quiet)));

    let (report, code) = match DuplicateFinder::new(finder_config).run() {
        Ok(report) => {
            let code = ExitCode::from_summary(&report.summary);
            (report, code)
        }
        Err(FinderError::Stopped { report }) => (*report, ExitCode::Interrupted),
        Err(e @ FinderError::Store(_)) => {
            return Err(anyhow::Error::new(e).context("Failed to process the index"));
        }
    };

    print_report(&report, &cli)?;
    Ok(code)
}

fn print_report(report: &RunReport, cli: &Cli) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let color = !cli.no_color && stdout.is_terminal();
    let mut out = stdout.lock();
    write_report(report, cli.output, color, &mut out).context("Failed to write report")?;
    out.flush().context("Failed to write report")?;
    Ok(())
}
