//! Tunable parameters shared by hashing and encryption.
//!
//! Only the work factor and the file streaming chunk size are configurable.
//! Salt, IV, key and tag lengths are part of the persisted formats and are
//! fixed constants in their modules.

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Minimum PBKDF2-HMAC-SHA256 iteration count accepted anywhere in the crate.
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Upper bound on iterations, for configuration and for stored records.
/// Bounds the work an attacker-supplied record can demand.
pub const MAX_PBKDF2_ITERATIONS: u32 = 10_000_000;

/// Default file streaming chunk size (8 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

const MIN_CHUNK_SIZE: usize = 1024;
const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Engine configuration, typically loaded once at startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct CryptoConfig {
    /// PBKDF2 iterations for new hash records and for encryption keys.
    pub pbkdf2_iterations: u32,
    /// Bytes read per step when streaming files through the cipher.
    pub file_chunk_size: usize,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: MIN_PBKDF2_ITERATIONS,
            file_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl CryptoConfig {
    /// Check every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Config` naming the offending field.
    pub fn validate(&self) -> Result<(), CryptoError> {
        if !(MIN_PBKDF2_ITERATIONS..=MAX_PBKDF2_ITERATIONS).contains(&self.pbkdf2_iterations) {
            return Err(CryptoError::Config(format!(
                "pbkdf2Iterations must be between {MIN_PBKDF2_ITERATIONS} and \
                 {MAX_PBKDF2_ITERATIONS}, got {}",
                self.pbkdf2_iterations
            )));
        }
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.file_chunk_size) {
            return Err(CryptoError::Config(format!(
                "fileChunkSize must be between {MIN_CHUNK_SIZE} and {MAX_CHUNK_SIZE}, got {}",
                self.file_chunk_size
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON document. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Config` if the JSON is malformed or a value is
    /// out of range.
    pub fn from_json(json: &str) -> Result<Self, CryptoError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CryptoError::Config(format!("invalid configuration JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}
