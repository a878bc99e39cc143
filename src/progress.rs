//! Progress reporting utilities using indicatif.
//!
//! This module provides the [`ProgressCallback`] trait that the pipeline
//! stages report through, and [`Progress`], which renders it as terminal
//! progress bars for the three long-running phases:
//!
//! - `"walking"`: spinner counting newly discovered files
//! - `"hashing"`: bar over hash candidates, with bytes read
//! - `"enforcing"`: bar over duplicate buckets

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytesize::ByteSize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Progress callback for the pipeline phases.
///
/// Implementations must tolerate calls from several hashing workers at once.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase ("walking", "hashing", "enforcing")
    /// * `total` - Total number of items, 0 if unknown
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each item processed.
    ///
    /// # Arguments
    ///
    /// * `current` - Current item number (1-based)
    /// * `path` - Path being processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called when an item has been processed, providing its size.
    fn on_item_completed(&self, _bytes: u64) {}

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);

    /// Called to update the progress message.
    fn on_message(&self, _message: &str) {}
}

/// Progress reporter using indicatif.
pub struct Progress {
    multi: MultiProgress,
    walking: Mutex<Option<ProgressBar>>,
    hashing: Mutex<Option<ProgressBar>>,
    enforcing: Mutex<Option<ProgressBar>>,
    bytes: AtomicU64,
    quiet: bool,
}

fn slot(bar: &Mutex<Option<ProgressBar>>) -> MutexGuard<'_, Option<ProgressBar>> {
    bar.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// If `quiet` is true nothing is drawn.
    ///
    /// ```
    /// use dupekeep::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            walking: Mutex::new(None),
            hashing: Mutex::new(None),
            enforcing: Mutex::new(None),
            bytes: AtomicU64::new(0),
            quiet,
        }
    }

    fn walking_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} new files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bar_style(color: &str) -> ProgressStyle {
        let template = format!(
            "[{{elapsed_precise}}] [{{bar:40.{color}/blue}}] {{pos}}/{{len}} ({{percent}}%) {{msg}} (ETA: {{eta}})"
        );
        ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
    }

    fn active(&self) -> Option<ProgressBar> {
        [&self.hashing, &self.enforcing, &self.walking]
            .into_iter()
            .find_map(|bar| slot(bar).clone())
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        match phase {
            "walking" => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::walking_style());
                pb.set_message("Walking");
                pb.enable_steady_tick(Duration::from_millis(100));
                *slot(&self.walking) = Some(pb);
            }
            "hashing" => {
                self.bytes.store(0, Ordering::Relaxed);
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(Self::bar_style("green"));
                pb.set_message("Hashing");
                *slot(&self.hashing) = Some(pb);
            }
            "enforcing" => {
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(Self::bar_style("red"));
                pb.set_message("Applying retention rules");
                *slot(&self.enforcing) = Some(pb);
            }
            other => {
                log::debug!("Progress: unknown phase '{}'", other);
            }
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }

        if let Some(pb) = self.active() {
            pb.set_position(current as u64);
            pb.set_message(truncate_path(path, 30));
        }
    }

    fn on_item_completed(&self, bytes: u64) {
        if self.quiet {
            return;
        }
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        match phase {
            "walking" => {
                if let Some(pb) = slot(&self.walking).take() {
                    pb.finish_with_message("Walking complete");
                }
            }
            "hashing" => {
                if let Some(pb) = slot(&self.hashing).take() {
                    let read = ByteSize(self.bytes.load(Ordering::Relaxed));
                    pb.finish_with_message(format!("Hashing complete ({read} read)"));
                }
            }
            "enforcing" => {
                if let Some(pb) = slot(&self.enforcing).take() {
                    pb.finish_with_message("Retention rules applied");
                }
            }
            _ => {}
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }

        if let Some(pb) = self.active() {
            pb.set_message(message.to_string());
        }
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let chars = file_name.chars().count();
    if chars + 4 > max_len {
        let tail: String = file_name.chars().skip(chars + 3 - max_len).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
