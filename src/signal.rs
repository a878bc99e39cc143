//! Cooperative cancellation and Ctrl+C handling.
//!
//! A [`CancellationToken`] is a cloneable handle over one shared flag. Every
//! stage of a run polls it at work-unit boundaries (between directory
//! entries, before a worker takes the next file, before each deletion) and
//! winds down when it is set.
//!
//! [`install_handler`] wires the token to Ctrl+C:
//!
//! - the first interrupt cancels the token and prints
//!   "Interrupted. Cleaning up..." to stderr
//! - a second interrupt waits for any in-progress index write to finish and
//!   exits the process with code 130
//!
//! # Usage
//!
//! ```rust,no_run
//! use dupekeep::signal::install_handler;
//!
//! let token = install_handler().expect("Failed to install signal handler");
//! if token.is_cancelled() {
//!     println!("Stopping...");
//! }
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::index::store::persistence_lock;

/// Exit code for SIGINT (Ctrl+C) interruption (128 + SIGINT).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared, cooperatively polled cancellation flag.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Request cancellation and report whether it had already been requested.
    fn cancel_again(&self) -> bool {
        self.flag.swap(true, Ordering::SeqCst)
    }

    /// Clear the flag. Only useful when a token is reused, e.g. in tests.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_TOKEN: OnceLock<CancellationToken> = OnceLock::new();

/// Install the Ctrl+C handler and return the token it cancels.
///
/// Calling this more than once in a process (e.g. from parallel tests)
/// returns the already installed token, reset to "not cancelled". If the
/// process already has a Ctrl+C handler that is not ours, an unhooked token
/// is returned instead; it still works for [`CancellationToken::cancel`].
///
/// # Errors
///
/// Currently always succeeds; installation failures fall back to an unhooked
/// token.
pub fn install_handler() -> Result<CancellationToken, SignalError> {
    if let Some(token) = GLOBAL_TOKEN.get() {
        token.reset();
        return Ok(token.clone());
    }

    let token = CancellationToken::new();
    let hooked = token.clone();

    match ctrlc::set_handler(move || {
        if hooked.cancel_again() {
            let _ = writeln!(std::io::stderr(), "\nInterrupted again. Exiting.");
            let _guard = persistence_lock();
            std::process::exit(EXIT_CODE_INTERRUPTED);
        }

        let _ = writeln!(std::io::stderr(), "\nInterrupted. Cleaning up...");
        let _ = std::io::stderr().flush();
        log::info!("Shutdown signal received");
    }) {
        Ok(()) => {
            let _ = GLOBAL_TOKEN.set(token.clone());
            Ok(token)
        }
        Err(_) => {
            if let Some(token) = GLOBAL_TOKEN.get() {
                token.reset();
                Ok(token.clone())
            } else {
                log::debug!("Ctrl+C handler already registered, using unhooked token");
                let fallback = CancellationToken::new();
                let _ = GLOBAL_TOKEN.set(fallback.clone());
                Ok(fallback)
            }
        }
    }
}
