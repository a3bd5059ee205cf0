//! Error taxonomy for `custos-crypto-core`.

use thiserror::Error;

/// Errors produced by hashing, encryption, MAC and random operations.
///
/// Messages never carry secret material. [`CryptoError::AuthenticationFailure`]
/// is deliberately uninformative: a wrong password and a tampered blob produce
/// the same value.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Empty password, message or key, or an out-of-range length argument.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// `secure_random_int` called with `min >= max`.
    #[error("invalid range: min ({min}) must be less than max ({max})")]
    InvalidRange {
        /// Inclusive lower bound supplied by the caller.
        min: i64,
        /// Exclusive upper bound supplied by the caller.
        max: i64,
    },

    /// Malformed stored record, encrypted blob or file header.
    #[error("format error: {0}")]
    Format(String),

    /// Password verification or GCM tag check failed.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// CSPRNG or a required algorithm is unavailable. Not retryable.
    #[error("cryptography unavailable: {0}")]
    CryptoUnavailable(String),

    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// File I/O failure during streaming encryption/decryption.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    /// Returns `true` when the process should abort initialization instead of
    /// handling the failure per call.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::CryptoUnavailable(_))
    }
}
