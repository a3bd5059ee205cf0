//! Cryptographically secure random generation.
//!
//! [`RandomGenerator`] is a cheap-to-clone handle over a [`RandomSource`].
//! Production code uses [`OsRandom`]; tests inject [`SeededRandom`] for
//! reproducible salts, IVs and passwords.

use std::fmt;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::{OsRng, StdRng};
use rand::seq::SliceRandom;
use rand::{CryptoRng, Rng, RngCore, SeedableRng};

use crate::error::CryptoError;
use crate::memory::SecretBytes;

/// A source of random bytes that may be shared across threads.
pub trait RandomSource: Send + Sync {
    /// Fill `dest` entirely with random bytes.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::CryptoUnavailable` if the source cannot produce
    /// output.
    fn fill(&self, dest: &mut [u8]) -> Result<(), CryptoError>;
}

/// The operating system CSPRNG (`getrandom`). Stateless and thread-safe.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<(), CryptoError> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| CryptoError::CryptoUnavailable(format!("OS random generator failed: {e}")))
    }
}

/// Deterministic generator for tests and fixtures. Never use for real secrets.
///
/// The inner `StdRng` sits behind a mutex so concurrent callers never observe
/// torn output.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    /// Create a generator from a 64-bit seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<(), CryptoError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| CryptoError::CryptoUnavailable("seeded generator poisoned".into()))?;
        rng.fill_bytes(dest);
        Ok(())
    }
}

impl fmt::Debug for SeededRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SeededRandom(..)")
    }
}

/// Random bytes, strings, and integers drawn from a shared [`RandomSource`].
#[derive(Clone)]
pub struct RandomGenerator {
    source: Arc<dyn RandomSource>,
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::os()
    }
}

impl fmt::Debug for RandomGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RandomGenerator(..)")
    }
}

impl RandomGenerator {
    /// Generator backed by the operating system CSPRNG.
    #[must_use]
    pub fn os() -> Self {
        Self::with_source(OsRandom)
    }

    /// Generator backed by a caller-supplied source.
    #[must_use]
    pub fn with_source(source: impl RandomSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Fill `dest` with random bytes.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::CryptoUnavailable` if the source fails.
    pub fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), CryptoError> {
        self.source.fill(dest)
    }

    /// `n` random bytes.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::CryptoUnavailable` if the source fails.
    pub fn secure_random_bytes(&self, n: usize) -> Result<Vec<u8>, CryptoError> {
        let mut out = vec![0u8; n];
        self.fill_bytes(&mut out)?;
        Ok(out)
    }

    /// A fixed-size random array (salts, IVs).
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::CryptoUnavailable` if the source fails.
    pub fn random_array<const N: usize>(&self) -> Result<[u8; N], CryptoError> {
        let mut out = [0u8; N];
        self.fill_bytes(&mut out)?;
        Ok(out)
    }

    /// A fixed-size random secret (keys), zeroed on drop.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::CryptoUnavailable` if the source fails.
    pub fn random_secret<const N: usize>(&self) -> Result<SecretBytes<N>, CryptoError> {
        let mut secret = SecretBytes::<N>::zeroed();
        self.fill_bytes(secret.expose_mut())?;
        Ok(secret)
    }

    /// URL-safe base64 string (no padding) of exactly `length` characters.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::CryptoUnavailable` if the source fails.
    pub fn secure_random_string(&self, length: usize) -> Result<String, CryptoError> {
        // Every 3 bytes encode to 4 characters.
        let byte_len = length.saturating_mul(3).div_ceil(4);
        let bytes = self.secure_random_bytes(byte_len)?;
        let mut encoded = URL_SAFE_NO_PAD.encode(bytes);
        encoded.truncate(length);
        Ok(encoded)
    }

    /// Uniform integer in `[min, max)`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidRange` if `min >= max`, or
    /// `CryptoError::CryptoUnavailable` if the source fails.
    pub fn secure_random_int(&self, min: i64, max: i64) -> Result<i64, CryptoError> {
        if min >= max {
            return Err(CryptoError::InvalidRange { min, max });
        }
        let mut rng = self.rng();
        let value = rng.gen_range(min..max);
        rng.finish(value)
    }

    /// Uniform index in `[0, bound)`; `bound` must be non-zero.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidInput` if `bound` is zero, or
    /// `CryptoError::CryptoUnavailable` if the source fails.
    pub fn uniform_index(&self, bound: usize) -> Result<usize, CryptoError> {
        if bound == 0 {
            return Err(CryptoError::InvalidInput("bound must be non-zero".into()));
        }
        let mut rng = self.rng();
        let index = rng.gen_range(0..bound);
        rng.finish(index)
    }

    /// Shuffle `items` in place (Fisher-Yates).
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::CryptoUnavailable` if the source fails.
    pub fn shuffle<T>(&self, items: &mut [T]) -> Result<(), CryptoError> {
        let mut rng = self.rng();
        items.shuffle(&mut rng);
        rng.finish(())
    }

    fn rng(&self) -> SourceRng<'_> {
        SourceRng {
            source: self.source.as_ref(),
            failure: None,
        }
    }
}

/// `rand` adapter over a [`RandomSource`].
///
/// `RngCore::fill_bytes` cannot fail, so the first source error is parked
/// here and surfaced by [`SourceRng::finish`]. After a failure the adapter
/// yields zeros, which still lets `rand`'s samplers terminate.
struct SourceRng<'a> {
    source: &'a dyn RandomSource,
    failure: Option<CryptoError>,
}

impl SourceRng<'_> {
    fn finish<T>(self, value: T) -> Result<T, CryptoError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }
}

impl RngCore for SourceRng<'_> {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if self.failure.is_some() {
            dest.fill(0);
            return;
        }
        if let Err(err) = self.source.fill(dest) {
            dest.fill(0);
            self.failure = Some(err);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

// Only ever wraps a CSPRNG-backed source in production; `SeededRandom` is
// test-only.
impl CryptoRng for SourceRng<'_> {}
