//! HMAC-SHA256 message authentication.
//!
//! Tags travel as standard base64. Verification decodes the expected tag and
//! compares raw 32-byte arrays in constant time; a tag that does not decode
//! to 32 bytes is compared against zeros so it costs the same and fails.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::hmac;
use subtle::ConstantTimeEq;

use crate::error::CryptoError;
use crate::memory::SecretBytes;
use crate::random::RandomGenerator;

/// HMAC-SHA256 output length in bytes.
pub const TAG_LEN: usize = 32;

/// Length of keys produced by [`MacEngine::generate_key`].
pub const KEY_LEN: usize = 32;

/// Creates and verifies HMAC-SHA256 tags.
#[derive(Clone, Debug, Default)]
pub struct MacEngine {
    rng: RandomGenerator,
}

impl MacEngine {
    /// Engine drawing keys from `rng`.
    #[must_use]
    pub const fn new(rng: RandomGenerator) -> Self {
        Self { rng }
    }

    /// Base64 HMAC-SHA256 of `message` under `key`. Deterministic.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidInput` if `message` or `key` is empty.
    pub fn create_hmac(&self, message: &[u8], key: &[u8]) -> Result<String, CryptoError> {
        let tag = compute(message, key)?;
        Ok(STANDARD.encode(tag))
    }

    /// Check `expected_tag` (base64) against the HMAC of `message`.
    ///
    /// Never errors: empty inputs and malformed tags are simply `false`.
    #[must_use]
    pub fn verify_hmac(&self, message: &[u8], key: &[u8], expected_tag: &str) -> bool {
        let Ok(computed) = compute(message, key) else {
            return false;
        };
        let (expected, well_formed) = match STANDARD.decode(expected_tag.trim()) {
            Ok(bytes) => match <[u8; TAG_LEN]>::try_from(bytes.as_slice()) {
                Ok(tag) => (tag, true),
                Err(_) => ([0u8; TAG_LEN], false),
            },
            Err(_) => ([0u8; TAG_LEN], false),
        };
        let matched: bool = computed[..].ct_eq(&expected[..]).into();
        matched && well_formed
    }

    /// Fresh random 256-bit MAC key.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::CryptoUnavailable` if the CSPRNG fails.
    pub fn generate_key(&self) -> Result<SecretBytes<KEY_LEN>, CryptoError> {
        self.rng.random_secret()
    }
}

fn compute(message: &[u8], key: &[u8]) -> Result<[u8; TAG_LEN], CryptoError> {
    if message.is_empty() {
        return Err(CryptoError::InvalidInput("message must not be empty".into()));
    }
    if key.is_empty() {
        return Err(CryptoError::InvalidInput("HMAC key must not be empty".into()));
    }
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    let tag = hmac::sign(&key, message);
    let mut out = [0u8; TAG_LEN];
    out.copy_from_slice(tag.as_ref());
    Ok(out)
}
