//! Incremental AES-256-GCM (NIST SP 800-38D) for streaming large inputs.
//!
//! `ring` only seals whole messages, so file encryption builds GCM from its
//! parts: AES-256 in 32-bit big-endian counter mode for confidentiality and
//! GHASH over the ciphertext for the tag. The output is byte-identical to a
//! one-shot AES-256-GCM seal with a 96-bit nonce and no associated data.
//!
//! ```text
//! J0   = nonce || 0x00000001
//! C    = CTR_K(inc32(J0), P)
//! S    = GHASH_H(C || pad || 0^64 || bitlen(C))      H = E_K(0^128)
//! tag  = S xor E_K(J0)
//! ```

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit, KeyIvInit, StreamCipher};
use aes::Aes256;
use ghash::universal_hash::UniversalHash;
use ghash::GHash;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::kdf::KEY_LEN;

/// GCM nonce (IV) length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

const BLOCK_LEN: usize = 16;

/// Largest plaintext GCM permits under one nonce: 2^39 - 256 bits.
const MAX_MESSAGE_LEN: u64 = (1 << 36) - 32;

type Aes256Ctr = ctr::Ctr32BE<Aes256>;

/// State shared by the encryptor and decryptor.
struct GcmState {
    keystream: Aes256Ctr,
    ghash: GHash,
    partial: Zeroizing<[u8; BLOCK_LEN]>,
    partial_len: usize,
    message_len: u64,
    tag_mask: Zeroizing<[u8; BLOCK_LEN]>,
}

impl GcmState {
    fn new(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN]) -> Self {
        let cipher = Aes256::new(GenericArray::from_slice(key));

        let mut hash_key = GenericArray::default();
        cipher.encrypt_block(&mut hash_key);
        let ghash = GHash::new(&hash_key);

        let mut j0 = [0u8; BLOCK_LEN];
        j0[..NONCE_LEN].copy_from_slice(nonce);
        j0[BLOCK_LEN - 1] = 1;

        let mut mask = GenericArray::clone_from_slice(&j0);
        cipher.encrypt_block(&mut mask);
        let mut tag_mask = Zeroizing::new([0u8; BLOCK_LEN]);
        tag_mask.copy_from_slice(&mask);

        // Payload counter starts at inc32(J0).
        j0[BLOCK_LEN - 1] = 2;
        let keystream = Aes256Ctr::new(
            GenericArray::from_slice(key),
            GenericArray::from_slice(&j0),
        );

        Self {
            keystream,
            ghash,
            partial: Zeroizing::new([0u8; BLOCK_LEN]),
            partial_len: 0,
            message_len: 0,
            tag_mask,
        }
    }

    fn count(&mut self, len: usize) -> Result<(), CryptoError> {
        self.message_len = u64::try_from(len)
            .ok()
            .and_then(|len| self.message_len.checked_add(len))
            .filter(|total| *total <= MAX_MESSAGE_LEN)
            .ok_or_else(|| CryptoError::InvalidInput("input exceeds the GCM message limit".into()))?;
        Ok(())
    }

    /// Feed ciphertext into GHASH, carrying incomplete blocks between calls.
    fn absorb(&mut self, mut data: &[u8]) {
        if self.partial_len > 0 {
            let take = BLOCK_LEN.saturating_sub(self.partial_len).min(data.len());
            let end = self.partial_len.saturating_add(take);
            self.partial[self.partial_len..end].copy_from_slice(&data[..take]);
            self.partial_len = end;
            data = &data[take..];
            if self.partial_len < BLOCK_LEN {
                return;
            }
            self.ghash.update_padded(&self.partial[..]);
            self.partial_len = 0;
        }

        let whole = data.len().saturating_sub(data.len() % BLOCK_LEN);
        self.ghash.update_padded(&data[..whole]);

        let rest = &data[whole..];
        self.partial[..rest.len()].copy_from_slice(rest);
        self.partial_len = rest.len();
    }

    fn tag(mut self) -> Zeroizing<[u8; TAG_LEN]> {
        if self.partial_len > 0 {
            self.ghash.update_padded(&self.partial[..self.partial_len]);
        }

        let bit_len = self.message_len.saturating_mul(8);
        let mut lengths = [0u8; BLOCK_LEN];
        lengths[8..].copy_from_slice(&bit_len.to_be_bytes());
        self.ghash.update_padded(&lengths);

        let digest = self.ghash.finalize();
        let mut tag = Zeroizing::new([0u8; TAG_LEN]);
        for ((out, s), m) in tag.iter_mut().zip(digest.iter()).zip(self.tag_mask.iter()) {
            *out = s ^ m;
        }
        tag
    }
}

/// Streaming AES-256-GCM encryption.
pub struct GcmEncryptor {
    state: GcmState,
}

impl GcmEncryptor {
    /// Start a message. The (key, nonce) pair must never be reused.
    #[must_use]
    pub fn new(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN]) -> Self {
        Self {
            state: GcmState::new(key, nonce),
        }
    }

    /// Encrypt `buf` in place. Chunks may have any length.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidInput` once the total exceeds the GCM
    /// per-message limit (~64 GiB).
    pub fn update(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        self.state.count(buf.len())?;
        self.state.keystream.apply_keystream(buf);
        self.state.absorb(buf);
        Ok(())
    }

    /// Finish the message and return the 128-bit tag.
    #[must_use]
    pub fn finalize(self) -> [u8; TAG_LEN] {
        *self.state.tag()
    }
}

/// Streaming AES-256-GCM decryption.
///
/// Plaintext from [`Self::update`] is unauthenticated until
/// [`Self::finalize`] succeeds; callers must not release it before then.
pub struct GcmDecryptor {
    state: GcmState,
}

impl GcmDecryptor {
    /// Start a message with the key and nonce used to encrypt it.
    #[must_use]
    pub fn new(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN]) -> Self {
        Self {
            state: GcmState::new(key, nonce),
        }
    }

    /// Decrypt `buf` in place.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidInput` once the total exceeds the GCM
    /// per-message limit.
    pub fn update(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        self.state.count(buf.len())?;
        self.state.absorb(buf);
        self.state.keystream.apply_keystream(buf);
        Ok(())
    }

    /// Check the received tag in constant time.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::AuthenticationFailure` on mismatch.
    pub fn finalize(self, tag: &[u8; TAG_LEN]) -> Result<(), CryptoError> {
        let expected = self.state.tag();
        if bool::from(expected[..].ct_eq(&tag[..])) {
            Ok(())
        } else {
            Err(CryptoError::AuthenticationFailure)
        }
    }
}
