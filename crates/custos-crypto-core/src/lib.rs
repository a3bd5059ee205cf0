//! `custos-crypto-core`: password hashing, authenticated encryption, HMAC and
//! secure randomness for Custos.
//!
//! Pure library: no network, no async, no persistence. Callers hand in raw
//! passwords or plaintext and store the opaque strings and blobs returned.
//!
//! Two ways in:
//! - [`CryptoContext`]: explicit configuration and injectable randomness
//! - the free functions below: a process-wide default context (OS CSPRNG,
//!   default [`CryptoConfig`]), created on first use

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod config;
pub mod random;

pub mod kdf;
pub mod validator;

pub mod hasher;

pub mod cipher;

pub mod mac;

pub mod context;

use std::path::Path;

use once_cell::sync::OnceCell;

pub use cipher::{CipherEngine, EncryptedBlob, GcmDecryptor, GcmEncryptor};
pub use config::{CryptoConfig, DEFAULT_CHUNK_SIZE, MAX_PBKDF2_ITERATIONS, MIN_PBKDF2_ITERATIONS};
pub use context::CryptoContext;
pub use error::CryptoError;
pub use hasher::{meets_complexity, HashRecord, PasswordHasher, StoredRecord, Verification};
pub use kdf::DerivedKey;
pub use mac::MacEngine;
pub use memory::{SecretBuffer, SecretBytes};
pub use random::{OsRandom, RandomGenerator, RandomSource, SeededRandom};
pub use validator::{is_valid_email, password_strength_score, sanitize_input, CharClasses};

static DEFAULT_CONTEXT: OnceCell<CryptoContext> = OnceCell::new();

/// The process-wide default context, built and self-tested on first call.
///
/// # Errors
///
/// Returns `CryptoError::CryptoUnavailable` if the self-test fails. A failed
/// initialization is retried on the next call.
pub fn default_context() -> Result<&'static CryptoContext, CryptoError> {
    DEFAULT_CONTEXT.get_or_try_init(|| CryptoContext::new(CryptoConfig::default()))
}

/// Hash a password into a storable record.
///
/// # Errors
///
/// See [`PasswordHasher::hash`].
pub fn hash_password(password: &str) -> Result<String, CryptoError> {
    default_context()?.password_hasher().hash(password)
}

/// Check a password against a stored record (current or legacy format).
///
/// # Errors
///
/// Only when the default context is unavailable; a mismatch is `Ok(false)`.
pub fn verify_password(password: &str, record: &str) -> Result<bool, CryptoError> {
    Ok(default_context()?.password_hasher().verify(password, record))
}

/// Encrypt a string under a password; returns a base64 blob.
///
/// # Errors
///
/// See [`CipherEngine::encrypt_string`].
pub fn encrypt(plaintext: &str, password: &str) -> Result<String, CryptoError> {
    default_context()?.cipher().encrypt_string(plaintext, password)
}

/// Decrypt a base64 blob produced by [`encrypt`].
///
/// # Errors
///
/// See [`CipherEngine::decrypt_string`].
pub fn decrypt(blob: &str, password: &str) -> Result<String, CryptoError> {
    default_context()?.cipher().decrypt_string(blob, password)
}

/// Encrypt a file, streaming it in chunks.
///
/// # Errors
///
/// See [`CipherEngine::encrypt_file`].
pub fn encrypt_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    password: &str,
) -> Result<(), CryptoError> {
    default_context()?.cipher().encrypt_file(input, output, password)
}

/// Decrypt a file written by [`encrypt_file`].
///
/// # Errors
///
/// See [`CipherEngine::decrypt_file`].
pub fn decrypt_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    password: &str,
) -> Result<(), CryptoError> {
    default_context()?.cipher().decrypt_file(input, output, password)
}

/// Base64 HMAC-SHA256 of `message` under `key`.
///
/// # Errors
///
/// See [`MacEngine::create_hmac`].
pub fn create_hmac(message: &str, key: &str) -> Result<String, CryptoError> {
    default_context()?
        .mac()
        .create_hmac(message.as_bytes(), key.as_bytes())
}

/// Constant-time check of a base64 HMAC-SHA256 tag.
///
/// # Errors
///
/// Only when the default context is unavailable.
pub fn verify_hmac(message: &str, key: &str, expected_tag: &str) -> Result<bool, CryptoError> {
    Ok(default_context()?
        .mac()
        .verify_hmac(message.as_bytes(), key.as_bytes(), expected_tag))
}

/// URL-safe random string of exactly `length` characters.
///
/// # Errors
///
/// Returns `CryptoError::CryptoUnavailable` if the CSPRNG fails.
pub fn secure_random_string(length: usize) -> Result<String, CryptoError> {
    default_context()?.random().secure_random_string(length)
}
