//! Password-based AES-256-GCM encryption of strings and files.
//!
//! This module provides:
//! - [`CipherEngine`]: derives a fresh key per call and seals or opens data
//! - [`EncryptedBlob`]: `salt || iv || ciphertext || tag` container
//! - [`stream`]: incremental GCM used by the file API
//!
//! Every encryption draws a new 32-byte salt, so each (key, IV) pair is used
//! exactly once. The string API returns standard base64 of the blob; the file
//! API writes the same bytes raw, so an encrypted file's base64 decrypts with
//! [`CipherEngine::decrypt_string`].

mod file;
pub mod stream;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::aead;
use zeroize::Zeroize;

use crate::config::CryptoConfig;
use crate::error::CryptoError;
use crate::kdf::{derive_key, DerivedKey};
use crate::memory::SecretBuffer;
use crate::random::RandomGenerator;

pub use stream::{GcmDecryptor, GcmEncryptor, NONCE_LEN, TAG_LEN};

/// Per-encryption salt length in bytes.
pub const SALT_LEN: usize = 32;

/// `salt || iv` prefix of every blob and encrypted file.
pub const HEADER_LEN: usize = SALT_LEN + NONCE_LEN;

/// Shortest valid blob: header and tag around an empty ciphertext.
pub const MIN_BLOB_LEN: usize = HEADER_LEN + TAG_LEN;

const DUMMY_SALT: [u8; SALT_LEN] = [0xA5; SALT_LEN];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Salt, IV, ciphertext and tag of one encryption.
///
/// Wire format: `salt (32) || iv (12) || ciphertext (variable) || tag (16)`.
#[must_use = "encrypted data must be stored or transmitted"]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedBlob {
    /// PBKDF2 salt the key was derived with.
    pub salt: [u8; SALT_LEN],
    /// 96-bit GCM nonce.
    pub iv: [u8; NONCE_LEN],
    /// Encrypted data, same length as the plaintext.
    pub ciphertext: Vec<u8>,
    /// 128-bit authentication tag.
    pub tag: [u8; TAG_LEN],
}

impl EncryptedBlob {
    /// Serialize to `salt || iv || ciphertext || tag`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MIN_BLOB_LEN.saturating_add(self.ciphertext.len()));
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Parse the wire format.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Format` if the input is shorter than 60 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < MIN_BLOB_LEN {
            return Err(CryptoError::Format(format!(
                "encrypted blob too short: {} bytes (minimum {MIN_BLOB_LEN})",
                bytes.len()
            )));
        }
        let (header, rest) = bytes.split_at(HEADER_LEN);
        let (salt, iv) = header.split_at(SALT_LEN);
        let (ciphertext, tag) = rest.split_at(rest.len().saturating_sub(TAG_LEN));

        let mut blob = Self {
            salt: [0u8; SALT_LEN],
            iv: [0u8; NONCE_LEN],
            ciphertext: ciphertext.to_vec(),
            tag: [0u8; TAG_LEN],
        };
        blob.salt.copy_from_slice(salt);
        blob.iv.copy_from_slice(iv);
        blob.tag.copy_from_slice(tag);
        Ok(blob)
    }

    /// Standard base64 (with padding) of [`Self::to_bytes`].
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Decode standard base64 and parse.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Format` for invalid base64 or a short blob.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CryptoError::Format("encrypted blob is not valid base64".into()))?;
        Self::from_bytes(&bytes)
    }
}

// ---------------------------------------------------------------------------
// CipherEngine
// ---------------------------------------------------------------------------

/// Password-based authenticated encryption.
#[derive(Clone, Debug)]
pub struct CipherEngine {
    iterations: u32,
    chunk_size: usize,
    rng: RandomGenerator,
}

impl CipherEngine {
    /// Build an engine from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Config` if the configuration is out of range.
    pub fn new(config: &CryptoConfig, rng: RandomGenerator) -> Result<Self, CryptoError> {
        config.validate()?;
        Ok(Self {
            iterations: config.pbkdf2_iterations,
            chunk_size: config.file_chunk_size,
            rng,
        })
    }

    /// Encrypt `plaintext` and return base64 of the blob.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidInput` for an empty password and
    /// `CryptoError::CryptoUnavailable` if the CSPRNG fails.
    pub fn encrypt_string(&self, plaintext: &str, password: &str) -> Result<String, CryptoError> {
        Ok(self.encrypt_bytes(plaintext.as_bytes(), password)?.to_base64())
    }

    /// Decrypt a base64 blob produced by [`Self::encrypt_string`] or an
    /// encrypted file.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidInput`: empty password
    /// - `CryptoError::Format`: not base64, too short, or not UTF-8 after
    ///   authentication
    /// - `CryptoError::AuthenticationFailure`: wrong password or modified data
    pub fn decrypt_string(&self, blob: &str, password: &str) -> Result<String, CryptoError> {
        require_password(password)?;
        let blob = match EncryptedBlob::from_base64(blob) {
            Ok(blob) => blob,
            Err(err) => {
                self.equalize_timing(password);
                return Err(err);
            }
        };
        let plaintext = self.decrypt_bytes(&blob, password)?;
        String::from_utf8(plaintext.expose().to_vec()).map_err(|err| {
            err.into_bytes().zeroize();
            CryptoError::Format("decrypted data is not valid UTF-8".into())
        })
    }

    /// Encrypt raw bytes under a key derived from `password`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::encrypt_string`].
    pub fn encrypt_bytes(
        &self,
        plaintext: &[u8],
        password: &str,
    ) -> Result<EncryptedBlob, CryptoError> {
        require_password(password)?;
        let salt: [u8; SALT_LEN] = self.rng.random_array()?;
        let iv: [u8; NONCE_LEN] = self.rng.random_array()?;
        let key = self.derive(password, &salt)?;

        let mut in_out = plaintext.to_vec();
        let Ok(tag) = sealing_key(&key)?.seal_in_place_separate_tag(
            aead::Nonce::assume_unique_for_key(iv),
            aead::Aad::empty(),
            &mut in_out,
        ) else {
            in_out.zeroize();
            return Err(CryptoError::CryptoUnavailable(
                "AES-256-GCM encryption failed".into(),
            ));
        };

        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(tag.as_ref());
        tracing::debug!(bytes = plaintext.len(), "data encrypted");

        Ok(EncryptedBlob {
            salt,
            iv,
            ciphertext: in_out,
            tag: tag_bytes,
        })
    }

    /// Authenticate and decrypt a blob. The plaintext is wiped on drop.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::AuthenticationFailure` for a wrong password or
    /// modified data, without saying which.
    pub fn decrypt_bytes(
        &self,
        blob: &EncryptedBlob,
        password: &str,
    ) -> Result<SecretBuffer, CryptoError> {
        require_password(password)?;
        let key = self.derive(password, &blob.salt)?;

        let mut ct_tag = Vec::with_capacity(blob.ciphertext.len().saturating_add(TAG_LEN));
        ct_tag.extend_from_slice(&blob.ciphertext);
        ct_tag.extend_from_slice(&blob.tag);

        let opened = sealing_key(&key)?
            .open_in_place(
                aead::Nonce::assume_unique_for_key(blob.iv),
                aead::Aad::empty(),
                &mut ct_tag,
            )
            .map(|plaintext| SecretBuffer::new(plaintext));
        ct_tag.zeroize();

        let plaintext = opened.map_err(|_| {
            tracing::debug!("blob failed authentication");
            CryptoError::AuthenticationFailure
        })?;
        tracing::debug!(bytes = plaintext.len(), "data decrypted");
        Ok(plaintext)
    }

    fn derive(&self, password: &str, salt: &[u8; SALT_LEN]) -> Result<DerivedKey, CryptoError> {
        derive_key(password.as_bytes(), salt, self.iterations)
    }

    /// One configured derivation, so rejecting a malformed input costs about
    /// as much as rejecting a wrong password.
    fn equalize_timing(&self, password: &str) {
        let key = self.derive(password, &DUMMY_SALT);
        std::hint::black_box(key.is_ok());
    }
}

fn require_password(password: &str) -> Result<(), CryptoError> {
    if password.is_empty() {
        return Err(CryptoError::InvalidInput("password must not be empty".into()));
    }
    Ok(())
}

fn sealing_key(key: &DerivedKey) -> Result<aead::LessSafeKey, CryptoError> {
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key.expose())
        .map_err(|_| CryptoError::CryptoUnavailable("AES-256-GCM key setup failed".into()))?;
    Ok(aead::LessSafeKey::new(unbound))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
