//! xxh3 file hasher with streaming and memory-mapped modes.
//!
//! # Overview
//!
//! This module provides the [`Hasher`] struct for computing the content
//! [`Digest`] of a file. Files are streamed through a fixed buffer. With
//! mmap enabled, files at or above the mmap threshold are memory-mapped and
//! hashed in one call instead. Both paths produce the same digest.
//!
//! The digest only has to tell byte-identical files apart from different
//! ones, so a fast non-cryptographic 64-bit hash is used.
//!
//! # Example
//!
//! ```no_run
//! use dupekeep::scanner::Hasher;
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let digest = hasher.full_hash(Path::new("some_file.bin")).unwrap();
//! println!("{}", digest);
//! ```

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::{xxh3_64, Xxh3};

use super::HashError;

/// Read buffer size for streaming hashing.
const BUFFER_SIZE: usize = 64 * 1024;

/// Files at or above this size are memory-mapped by default.
pub const DEFAULT_MMAP_THRESHOLD: u64 = 64 * 1024 * 1024;

/// Fixed-width fingerprint of file content.
///
/// Rendered (and persisted) as 16 lower-case hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Digest(u64);

impl Digest {
    /// Wrap a raw 64-bit value.
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// The raw 64-bit value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Digest of an in-memory buffer.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(xxh3_64(bytes))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Error returned when parsing a digest from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid digest '{0}': expected 16 hex digits")]
pub struct ParseDigestError(String);

impl FromStr for Digest {
    type Err = ParseDigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 {
            return Err(ParseDigestError(s.to_string()));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| ParseDigestError(s.to_string()))
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.to_string()
    }
}

impl TryFrom<String> for Digest {
    type Error = ParseDigestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Content hasher.
///
/// Cheap to share between threads; it holds configuration only.
#[derive(Debug, Clone)]
pub struct Hasher {
    use_mmap: bool,
    mmap_threshold: u64,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a streaming hasher.
    ///
    /// Memory mapping is opt-in through [`Hasher::with_mmap`]; once enabled it
    /// applies to files of at least [`DEFAULT_MMAP_THRESHOLD`] bytes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            use_mmap: false,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
        }
    }

    /// Enable or disable memory-mapped hashing.
    ///
    /// A mapped file that another process truncates while it is being hashed
    /// raises `SIGBUS` and terminates the process, without the partial index
    /// save a cancelled run gets. Only enable this for trees nothing else
    /// writes to during a run.
    #[must_use]
    pub fn with_mmap(mut self, enabled: bool) -> Self {
        self.use_mmap = enabled;
        self
    }

    /// Whether large files are memory-mapped.
    #[must_use]
    pub fn mmap_enabled(&self) -> bool {
        self.use_mmap
    }

    /// Set the size at which files are memory-mapped instead of streamed.
    #[must_use]
    pub fn with_mmap_threshold(mut self, threshold: u64) -> Self {
        self.mmap_threshold = threshold;
        self
    }

    /// Hash the entire content of a file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn full_hash(&self, path: &Path) -> Result<Digest, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;

        if self.use_mmap {
            let len = file
                .metadata()
                .map_err(|e| HashError::from_io(path, e))?
                .len();
            // Zero-length files cannot be mapped on every platform.
            if len > 0 && len >= self.mmap_threshold {
                return self.hash_mmap(path, &file);
            }
        }

        Self::hash_stream(path, file)
    }

    fn hash_stream(path: &Path, mut file: File) -> Result<Digest, HashError> {
        let mut state = Xxh3::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];

        loop {
            match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => state.update(&buffer[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            }
        }

        Ok(Digest(state.digest()))
    }

    fn hash_mmap(&self, path: &Path, file: &File) -> Result<Digest, HashError> {
        // SAFETY: the mapping is read-only and does not outlive `file`. The
        // bytes are only valid while no other process shrinks the file; a
        // truncation during the read faults with SIGBUS and aborts the whole
        // process. That is why mapping is off unless explicitly enabled.
        let map = unsafe { memmap2::Mmap::map(file) };
        match map {
            Ok(map) => {
                log::trace!("Hashing {} via mmap ({} bytes)", path.display(), map.len());
                Ok(Digest(xxh3_64(&map)))
            }
            Err(e) => {
                log::debug!(
                    "mmap failed for {}, falling back to streaming: {}",
                    path.display(),
                    e
                );
                let file = file.try_clone().map_err(|e| HashError::from_io(path, e))?;
                Self::hash_stream(path, file)
            }
        }
    }
}
