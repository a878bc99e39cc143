//! Application configuration management.
//!
//! Settings are layered with [`figment`], later layers winning:
//!
//! 1. built-in defaults
//! 2. TOML file (`--config <PATH>`, or `config.toml` in the platform config
//!    directory)
//! 3. environment variables prefixed `DUPEKEEP_` (e.g. `DUPEKEEP_WORKERS=8`)
//! 4. command-line flags, applied by the caller
//!
//! A missing file simply yields the lower layers. A file or variable that
//! does not parse is reported with a warning and the defaults are used.
//!
//! ```toml
//! workers = 8
//! database = "/var/lib/dupekeep/index.json"
//! trash = true
//! mmap_threshold = 134217728
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::duplicates::hashing::DEFAULT_QUEUE_DEPTH;
use crate::scanner::DEFAULT_MMAP_THRESHOLD;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "DUPEKEEP_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hashing worker count (default: available parallelism)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Persisted index path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    /// Report instead of deleting
    pub dry_run: bool,
    /// Move files to the trash instead of unlinking them
    pub trash: bool,
    /// Memory-map large files while hashing (off by default: a file
    /// truncated while mapped kills the process)
    pub mmap: bool,
    /// Size in bytes at which files are memory-mapped
    pub mmap_threshold: u64,
    /// Capacity of the hashing work queue
    pub queue_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: None,
            database: None,
            dry_run: false,
            trash: false,
            mmap: false,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl Config {
    /// Load the configuration, falling back to defaults on any error.
    ///
    /// `path` overrides the platform config file location.
    #[must_use]
    pub fn load(path: Option<&Path>) -> Self {
        let file = path.map(Path::to_path_buf).or_else(Self::config_path);
        match Self::figment(file.as_deref()).extract() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Invalid configuration, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Load defaults plus the given TOML file only, without environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns the figment error if the file does not parse.
    pub fn load_from_path(path: &Path) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .extract()
    }

    /// The full provider chain: defaults, optional file, environment.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            log::debug!("Reading configuration from {}", file.display());
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Default platform-specific configuration file path.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "dupekeep", "dupekeep")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
