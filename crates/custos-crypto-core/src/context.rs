//! Explicit engine context.
//!
//! A [`CryptoContext`] owns the configuration and the random source and hands
//! out engines built from them. Construction runs a short self-test so a
//! broken CSPRNG or primitive is reported once, up front, as
//! [`CryptoError::CryptoUnavailable`], instead of surfacing as corrupt output
//! later.
//!
//! Self-test checks:
//! - two 32-byte random draws are non-zero and distinct
//! - PBKDF2-HMAC-SHA256 (RFC 7914 §11, one iteration)
//! - HMAC-SHA256 (RFC 4231 case 2)
//! - AES-256-GCM one-shot and streaming (NIST SP 800-38D test case 14)

use std::num::NonZeroU32;

use ring::{aead, hmac, pbkdf2};

use crate::cipher::{CipherEngine, GcmEncryptor};
use crate::config::CryptoConfig;
use crate::error::CryptoError;
use crate::hasher::PasswordHasher;
use crate::mac::MacEngine;
use crate::random::RandomGenerator;

const PBKDF2_EXPECTED: [u8; 32] = [
    0x55, 0xac, 0x04, 0x6e, 0x56, 0xe3, 0x08, 0x9f, 0xec, 0x16, 0x91, 0xc2, 0x25, 0x44, 0xb6,
    0x05, 0xf9, 0x41, 0x85, 0x21, 0x6d, 0xde, 0x04, 0x65, 0xe6, 0x8b, 0x9d, 0x57, 0xc2, 0x0d,
    0xac, 0xbc,
];

const HMAC_EXPECTED: [u8; 32] = [
    0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e, 0x6a, 0x04, 0x24, 0x26, 0x08, 0x95, 0x75,
    0xc7, 0x5a, 0x00, 0x3f, 0x08, 0x9d, 0x27, 0x39, 0x83, 0x9d, 0xec, 0x58, 0xb9, 0x64, 0xec,
    0x38, 0x43,
];

const GCM_EXPECTED_CT: [u8; 16] = [
    0xce, 0xa7, 0x40, 0x3d, 0x4d, 0x60, 0x6b, 0x6e, 0x07, 0x4e, 0xc5, 0xd3, 0xba, 0xf3, 0x9d,
    0x18,
];

const GCM_EXPECTED_TAG: [u8; 16] = [
    0xd0, 0xd1, 0xc8, 0xa7, 0x99, 0x99, 0x6b, 0xf0, 0x26, 0x5b, 0x98, 0xb5, 0xd4, 0x8a, 0xb9,
    0x19,
];

/// Configuration, randomness and the engines built from them.
#[derive(Clone, Debug)]
pub struct CryptoContext {
    config: CryptoConfig,
    random: RandomGenerator,
    hasher: PasswordHasher,
    cipher: CipherEngine,
    mac: MacEngine,
}

impl CryptoContext {
    /// Context over the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Config` for an invalid configuration and
    /// `CryptoError::CryptoUnavailable` if the self-test fails.
    pub fn new(config: CryptoConfig) -> Result<Self, CryptoError> {
        Self::with_random(config, RandomGenerator::os())
    }

    /// Context over an injected random source.
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`].
    pub fn with_random(config: CryptoConfig, random: RandomGenerator) -> Result<Self, CryptoError> {
        config.validate()?;
        self_test(&random).inspect_err(|e| tracing::error!(error = %e, "crypto self-test failed"))?;

        let hasher = PasswordHasher::new(&config, random.clone())?;
        let cipher = CipherEngine::new(&config, random.clone())?;
        let mac = MacEngine::new(random.clone());
        tracing::debug!(
            iterations = config.pbkdf2_iterations,
            chunk_size = config.file_chunk_size,
            "crypto context ready"
        );
        Ok(Self {
            config,
            random,
            hasher,
            cipher,
            mac,
        })
    }

    /// Validated configuration the engines were built from.
    #[must_use]
    pub const fn config(&self) -> &CryptoConfig {
        &self.config
    }

    /// Shared random generator.
    #[must_use]
    pub const fn random(&self) -> &RandomGenerator {
        &self.random
    }

    /// Password hasher at the configured iteration count.
    #[must_use]
    pub const fn password_hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// AES-256-GCM engine for strings, bytes and files.
    #[must_use]
    pub const fn cipher(&self) -> &CipherEngine {
        &self.cipher
    }

    /// HMAC-SHA256 engine.
    #[must_use]
    pub const fn mac(&self) -> &MacEngine {
        &self.mac
    }
}

// ---------------------------------------------------------------------------
// Self-test
// ---------------------------------------------------------------------------

fn self_test(random: &RandomGenerator) -> Result<(), CryptoError> {
    check_random(random)?;
    check_pbkdf2()?;
    check_hmac()?;
    check_aes_gcm()?;
    Ok(())
}

fn unavailable(what: &str) -> CryptoError {
    CryptoError::CryptoUnavailable(format!("{what} self-test failed"))
}

fn check_random(random: &RandomGenerator) -> Result<(), CryptoError> {
    let first: [u8; 32] = random.random_array()?;
    let second: [u8; 32] = random.random_array()?;
    if first == [0u8; 32] || first == second {
        return Err(unavailable("random generator"));
    }
    Ok(())
}

fn check_pbkdf2() -> Result<(), CryptoError> {
    let mut out = [0u8; 32];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        NonZeroU32::MIN,
        b"salt",
        b"passwd",
        &mut out,
    );
    if out != PBKDF2_EXPECTED {
        return Err(unavailable("PBKDF2-HMAC-SHA256"));
    }
    Ok(())
}

fn check_hmac() -> Result<(), CryptoError> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, b"Jefe");
    let tag = hmac::sign(&key, b"what do ya want for nothing?");
    if tag.as_ref() != HMAC_EXPECTED {
        return Err(unavailable("HMAC-SHA256"));
    }
    Ok(())
}

fn check_aes_gcm() -> Result<(), CryptoError> {
    let key = [0u8; 32];
    let nonce = [0u8; 12];

    let sealing = aead::UnboundKey::new(&aead::AES_256_GCM, &key)
        .map(aead::LessSafeKey::new)
        .map_err(|_| unavailable("AES-256-GCM"))?;
    let mut in_out = [0u8; 16];
    let tag = sealing
        .seal_in_place_separate_tag(
            aead::Nonce::assume_unique_for_key(nonce),
            aead::Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| unavailable("AES-256-GCM"))?;
    if in_out != GCM_EXPECTED_CT || tag.as_ref() != GCM_EXPECTED_TAG {
        return Err(unavailable("AES-256-GCM"));
    }

    let mut streamed = [0u8; 16];
    let mut encryptor = GcmEncryptor::new(&key, &nonce);
    encryptor.update(&mut streamed)?;
    if streamed != GCM_EXPECTED_CT || encryptor.finalize() != GCM_EXPECTED_TAG {
        return Err(unavailable("streaming AES-256-GCM"));
    }
    Ok(())
}
