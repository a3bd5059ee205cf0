//! Salted, iterated password hashing with constant-time verification.
//!
//! This module provides:
//! - [`PasswordHasher`]: hash, verify, verify-and-upgrade, random passwords
//! - [`HashRecord`]: the canonical `<iterations>:<salt>:<key>` record
//! - [`LegacyHashRecord`]: read-only `base64(salt || SHA-256(salt || pw))`
//! - [`StoredRecord`]: explicit format detection over both
//!
//! # Record formats
//!
//! | Format  | Encoding                                         | Produced |
//! |---------|--------------------------------------------------|----------|
//! | current | `"<iterations>:<b64 salt[32]>:<b64 key[32]>"`    | yes      |
//! | legacy  | `b64(salt[16] || SHA256(salt || password))`      | never    |
//!
//! A record containing `:` is the current format. Anything else must decode
//! to exactly 48 bytes to be treated as legacy. Legacy and under-iterated
//! records verify normally but are reported by
//! [`PasswordHasher::verify_and_upgrade`] so callers can persist a fresh
//! record after a successful login.
//!
//! # Timing
//!
//! Every verification performs one PBKDF2 derivation regardless of outcome:
//! malformed, unknown, legacy and mismatching records all cost the same work
//! as a successful check, so elapsed time does not reveal why a check failed.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::digest;
use subtle::ConstantTimeEq;

use crate::config::{CryptoConfig, MAX_PBKDF2_ITERATIONS, MIN_PBKDF2_ITERATIONS};
use crate::error::CryptoError;
use crate::kdf::{derive_key, DerivedKey, KEY_LEN};
use crate::random::RandomGenerator;
use crate::validator::CharClasses;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Salt length of the current record format.
pub const SALT_LEN: usize = 32;

/// Salt length of the legacy record format.
pub const LEGACY_SALT_LEN: usize = 16;

/// Decoded length of a legacy record: 16-byte salt + 32-byte SHA-256.
pub const LEGACY_RECORD_LEN: usize = LEGACY_SALT_LEN + KEY_LEN;

/// Shortest password [`PasswordHasher::generate_random_password`] accepts
/// (one character from each class).
pub const MIN_GENERATED_LENGTH: usize = 4;

/// Longest password [`PasswordHasher::generate_random_password`] accepts.
pub const MAX_GENERATED_LENGTH: usize = 256;

/// Minimum length for [`meets_complexity`].
pub const COMPLEXITY_MIN_LENGTH: usize = 8;

const DELIMITER: char = ':';
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SPECIAL: &[u8] = b"!@#$%^&*()-_=+[]{}|;:,.<>?/~";

/// Salt used for the equalizing derivation on failure paths.
const DUMMY_SALT: [u8; SALT_LEN] = [0x5A; SALT_LEN];

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Canonical password record. The derived key is wiped on drop.
pub struct HashRecord {
    iterations: u32,
    salt: [u8; SALT_LEN],
    derived_key: DerivedKey,
}

impl HashRecord {
    /// PBKDF2 iteration count stored in the record.
    #[must_use]
    pub const fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Per-record salt.
    #[must_use]
    pub const fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    /// Encode as `"<iterations>:<base64 salt>:<base64 key>"`.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}{DELIMITER}{}{DELIMITER}{}",
            self.iterations,
            STANDARD.encode(self.salt),
            STANDARD.encode(self.derived_key.expose())
        )
    }

    fn parse(record: &str) -> Result<Self, CryptoError> {
        let mut parts = record.split(DELIMITER);
        let (Some(iterations), Some(salt), Some(key), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CryptoError::Format(
                "hash record must have exactly three fields".into(),
            ));
        };

        if iterations.is_empty() || !iterations.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CryptoError::Format("iteration field is not a number".into()));
        }
        let iterations: u32 = iterations
            .parse()
            .map_err(|_| CryptoError::Format("iteration field out of range".into()))?;
        if !(MIN_PBKDF2_ITERATIONS..=MAX_PBKDF2_ITERATIONS).contains(&iterations) {
            return Err(CryptoError::Format(format!(
                "iteration count {iterations} outside accepted range"
            )));
        }

        let salt: [u8; SALT_LEN] = decode_fixed(salt, "salt")?;
        let key: [u8; KEY_LEN] = decode_fixed(key, "derived key")?;

        Ok(Self {
            iterations,
            salt,
            derived_key: DerivedKey::new(key),
        })
    }
}

impl fmt::Debug for HashRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashRecord")
            .field("iterations", &self.iterations)
            .field("derived_key", &self.derived_key)
            .finish_non_exhaustive()
    }
}

/// Read-only record from before iterated hashing was introduced.
pub struct LegacyHashRecord {
    salt: [u8; LEGACY_SALT_LEN],
    digest: [u8; KEY_LEN],
}

impl fmt::Debug for LegacyHashRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LegacyHashRecord(***)")
    }
}

impl LegacyHashRecord {
    fn from_decoded(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != LEGACY_RECORD_LEN {
            return Err(CryptoError::Format(format!(
                "legacy record must decode to {LEGACY_RECORD_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut salt = [0u8; LEGACY_SALT_LEN];
        salt.copy_from_slice(&bytes[..LEGACY_SALT_LEN]);
        let mut digest = [0u8; KEY_LEN];
        digest.copy_from_slice(&bytes[LEGACY_SALT_LEN..]);
        Ok(Self { salt, digest })
    }

    fn matches(&self, password: &[u8]) -> bool {
        let mut ctx = digest::Context::new(&digest::SHA256);
        ctx.update(&self.salt);
        ctx.update(password);
        let computed = ctx.finish();
        bool::from(computed.as_ref().ct_eq(&self.digest))
    }
}

/// A stored password record in either supported format.
#[derive(Debug)]
pub enum StoredRecord {
    /// Canonical iterated PBKDF2 record.
    Current(HashRecord),
    /// Single SHA-256 record; verifiable, never produced.
    Legacy(LegacyHashRecord),
}

impl StoredRecord {
    /// Short label for logs.
    #[must_use]
    pub const fn format_name(&self) -> &'static str {
        match self {
            Self::Current(_) => "current",
            Self::Legacy(_) => "legacy",
        }
    }
}

impl FromStr for StoredRecord {
    type Err = CryptoError;

    fn from_str(record: &str) -> Result<Self, Self::Err> {
        if record.contains(DELIMITER) {
            return HashRecord::parse(record).map(Self::Current);
        }
        let decoded = STANDARD
            .decode(record)
            .map_err(|_| CryptoError::Format("unrecognized hash record format".into()))?;
        LegacyHashRecord::from_decoded(&decoded).map(Self::Legacy)
    }
}

/// Result of [`PasswordHasher::verify_and_upgrade`].
#[derive(Debug, PartialEq, Eq)]
pub enum Verification {
    /// Wrong password, or the record could not be used.
    Rejected,
    /// Password matches a record that meets the current work factor.
    Accepted,
    /// Password matches, but the record is legacy or under-iterated. The
    /// caller should replace the stored record with `new_record`.
    AcceptedNeedsRehash {
        /// Freshly hashed record for the same password.
        new_record: String,
    },
}

impl Verification {
    /// Returns `true` for both accepted variants.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

// ---------------------------------------------------------------------------
// PasswordHasher
// ---------------------------------------------------------------------------

/// Hashes and verifies passwords with PBKDF2-HMAC-SHA256.
#[derive(Clone, Debug)]
pub struct PasswordHasher {
    iterations: u32,
    rng: RandomGenerator,
}

impl PasswordHasher {
    /// Build a hasher from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Config` if the configuration is out of range.
    pub fn new(config: &CryptoConfig, rng: RandomGenerator) -> Result<Self, CryptoError> {
        config.validate()?;
        Ok(Self {
            iterations: config.pbkdf2_iterations,
            rng,
        })
    }

    /// Iteration count used for new records.
    #[must_use]
    pub const fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hash `password` into a new canonical record with a fresh salt.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidInput` for an empty password and
    /// `CryptoError::CryptoUnavailable` if the CSPRNG fails.
    pub fn hash(&self, password: &str) -> Result<String, CryptoError> {
        if password.is_empty() {
            return Err(CryptoError::InvalidInput("password must not be empty".into()));
        }
        let salt: [u8; SALT_LEN] = self.rng.random_array()?;
        let derived_key = derive_key(password.as_bytes(), &salt, self.iterations)?;
        let record = HashRecord {
            iterations: self.iterations,
            salt,
            derived_key,
        };
        tracing::debug!(iterations = self.iterations, "password hashed");
        Ok(record.encode())
    }

    /// Check `password` against a stored record of either format.
    ///
    /// Never errors: every failure, including a malformed record, is `false`.
    #[must_use]
    pub fn verify(&self, password: &str, record: &str) -> bool {
        self.check(password, record).is_some()
    }

    /// Verify and report whether the stored record should be replaced.
    ///
    /// # Errors
    ///
    /// Only fails if re-hashing an accepted password fails (CSPRNG failure).
    pub fn verify_and_upgrade(
        &self,
        password: &str,
        record: &str,
    ) -> Result<Verification, CryptoError> {
        match self.check(password, record) {
            None => Ok(Verification::Rejected),
            Some(stored_iterations) if stored_iterations >= self.iterations => {
                Ok(Verification::Accepted)
            }
            Some(_) => {
                tracing::warn!("password record below current work factor; re-hashing");
                Ok(Verification::AcceptedNeedsRehash {
                    new_record: self.hash(password)?,
                })
            }
        }
    }

    /// Returns `true` if `record` is legacy, under-iterated, or unparseable.
    #[must_use]
    pub fn needs_rehash(&self, record: &str) -> bool {
        match record.parse::<StoredRecord>() {
            Ok(StoredRecord::Current(current)) => current.iterations < self.iterations,
            Ok(StoredRecord::Legacy(_)) | Err(_) => true,
        }
    }

    /// Random password with at least one uppercase, lowercase, digit and
    /// special character, shuffled so the mandatory characters have no fixed
    /// position.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidInput` if `length` is outside
    /// [`MIN_GENERATED_LENGTH`]..=[`MAX_GENERATED_LENGTH`].
    pub fn generate_random_password(&self, length: usize) -> Result<String, CryptoError> {
        if !(MIN_GENERATED_LENGTH..=MAX_GENERATED_LENGTH).contains(&length) {
            return Err(CryptoError::InvalidInput(format!(
                "password length must be between {MIN_GENERATED_LENGTH} and \
                 {MAX_GENERATED_LENGTH}, got {length}"
            )));
        }

        let classes = [UPPERCASE, LOWERCASE, DIGITS, SPECIAL];
        let pool: Vec<u8> = classes.concat();

        let mut chars = Vec::with_capacity(length);
        for class in classes {
            chars.push(class[self.rng.uniform_index(class.len())?]);
        }
        while chars.len() < length {
            chars.push(pool[self.rng.uniform_index(pool.len())?]);
        }
        self.rng.shuffle(&mut chars)?;

        Ok(chars.into_iter().map(char::from).collect())
    }

    /// Core verification. Returns the stored iteration count on a match
    /// (legacy records report 0 so they always need a rehash).
    fn check(&self, password: &str, record: &str) -> Option<u32> {
        let parsed = if password.is_empty() {
            Err(CryptoError::InvalidInput("empty password".into()))
        } else {
            record.parse::<StoredRecord>()
        };

        match parsed {
            Ok(StoredRecord::Current(stored)) => {
                let Ok(computed) = derive_key(password.as_bytes(), &stored.salt, stored.iterations)
                else {
                    self.equalize_timing(password);
                    return None;
                };
                let matched: bool = computed
                    .expose()
                    .ct_eq(stored.derived_key.expose())
                    .into();
                // An under-iterated record must not be cheaper to reject than
                // a malformed one.
                if stored.iterations < self.iterations {
                    self.equalize_timing(password);
                }
                tracing::debug!(format = "current", iterations = stored.iterations, "password checked");
                matched.then_some(stored.iterations)
            }
            Ok(StoredRecord::Legacy(legacy)) => {
                self.equalize_timing(password);
                let matched = legacy.matches(password.as_bytes());
                if matched {
                    tracing::warn!("legacy password record verified; caller should upgrade it");
                }
                matched.then_some(0)
            }
            Err(err) => {
                self.equalize_timing(password);
                tracing::debug!(reason = %err, "password check rejected");
                None
            }
        }
    }

    /// Spend one configured derivation so failure paths cost as much as a
    /// genuine check.
    fn equalize_timing(&self, password: &str) {
        let key = derive_key(password.as_bytes(), &DUMMY_SALT, self.iterations);
        std::hint::black_box(key.is_ok());
    }
}

/// Length ≥ 8 and at least three of the four character classes.
#[must_use]
pub fn meets_complexity(password: &str) -> bool {
    password.chars().count() >= COMPLEXITY_MIN_LENGTH && CharClasses::of(password).count() >= 3
}

fn decode_fixed<const N: usize>(field: &str, name: &str) -> Result<[u8; N], CryptoError> {
    let bytes = STANDARD
        .decode(field)
        .map_err(|_| CryptoError::Format(format!("{name} is not valid base64")))?;
    bytes
        .try_into()
        .map_err(|_| CryptoError::Format(format!("{name} must be {N} bytes")))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
