//! PBKDF2-HMAC-SHA256 key derivation.
//!
//! Used by both the password hasher (to produce the stored derived key) and
//! the cipher engine (to turn a password + salt into an AES-256 key). The
//! output is always a [`SecretBytes`] so it is wiped when the caller's
//! operation ends, on success or failure.

use std::num::NonZeroU32;

use ring::pbkdf2;

use crate::config::{MAX_PBKDF2_ITERATIONS, MIN_PBKDF2_ITERATIONS};
use crate::error::CryptoError;
use crate::memory::SecretBytes;

/// Derived key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Minimum salt length accepted for derivation.
const MIN_SALT_LEN: usize = 16;

/// A derived 256-bit key.
pub type DerivedKey = SecretBytes<KEY_LEN>;

/// Derive a 256-bit key from `password` and `salt`.
///
/// # Errors
///
/// Returns `CryptoError::InvalidInput` if the salt is shorter than 16 bytes or
/// `iterations` is outside the accepted range. The floor is enforced here so
/// no caller can derive a key with a weaker work factor.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<DerivedKey, CryptoError> {
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::InvalidInput(format!(
            "salt too short: {} bytes (minimum {MIN_SALT_LEN})",
            salt.len()
        )));
    }
    if !(MIN_PBKDF2_ITERATIONS..=MAX_PBKDF2_ITERATIONS).contains(&iterations) {
        return Err(CryptoError::InvalidInput(format!(
            "iteration count {iterations} outside {MIN_PBKDF2_ITERATIONS}..={MAX_PBKDF2_ITERATIONS}"
        )));
    }
    let rounds = NonZeroU32::new(iterations)
        .ok_or_else(|| CryptoError::InvalidInput("iteration count must be non-zero".into()))?;

    let mut key = DerivedKey::zeroed();
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        rounds,
        salt,
        password,
        key.expose_mut(),
    );
    Ok(key)
}
