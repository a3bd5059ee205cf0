//! Zeroizing containers for passwords and derived keys.
//!
//! - [`SecretBuffer`] holds variable-length secrets (password copies, decrypted
//!   plaintext before it is handed back as a `String`).
//! - [`SecretBytes`] holds fixed-length secrets (derived AES/HMAC keys).
//!
//! Both erase their contents on drop, print as `***` in `Debug`/`Display`, and
//! ask the OS to keep their pages out of swap (`mlock`, best effort).

use secrecy::{ExposeSecret, SecretSlice};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ---------------------------------------------------------------------------
// Page locking
// ---------------------------------------------------------------------------

/// Holds an `mlock` on a region and releases it on drop.
struct PageLock {
    ptr: *const u8,
    len: usize,
    locked: bool,
}

// SAFETY: the pointer is only handed to mlock/munlock, which are thread-safe.
// The memory itself is owned and accessed through SecretBuffer/SecretBytes.
unsafe impl Send for PageLock {}
unsafe impl Sync for PageLock {}

impl PageLock {
    const fn none() -> Self {
        Self {
            ptr: std::ptr::null(),
            len: 0,
            locked: false,
        }
    }

    fn acquire(ptr: *const u8, len: usize) -> Self {
        let locked = platform::mlock(ptr, len);
        if !locked && len > 0 {
            static WARNED: std::sync::Once = std::sync::Once::new();
            WARNED.call_once(|| {
                tracing::warn!(
                    "mlock unavailable; secret buffers may be swapped to disk \
                     (consider raising RLIMIT_MEMLOCK)"
                );
            });
        }
        Self { ptr, len, locked }
    }
}

impl Drop for PageLock {
    fn drop(&mut self) {
        if self.locked {
            platform::munlock(self.ptr, self.len);
        }
    }
}

// ---------------------------------------------------------------------------
// SecretBuffer
// ---------------------------------------------------------------------------

/// Heap buffer for variable-length secrets, zeroed on drop.
pub struct SecretBuffer {
    inner: SecretSlice<u8>,
    lock: PageLock,
}

impl SecretBuffer {
    /// Copy `data` into a fresh locked allocation.
    ///
    /// The caller owns `data` and is responsible for clearing it if it is
    /// itself sensitive.
    #[must_use]
    pub fn new(data: &[u8]) -> Self {
        let inner: SecretSlice<u8> = data.to_vec().into();
        let exposed = inner.expose_secret();
        let lock = PageLock::acquire(exposed.as_ptr(), exposed.len());
        Self { inner, lock }
    }

    /// Borrow the raw bytes for a cryptographic operation.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.inner.expose_secret()
    }

    /// Number of bytes held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.expose_secret().len()
    }

    /// Returns `true` if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the pages backing this buffer are locked in RAM.
    #[must_use]
    pub const fn is_mlocked(&self) -> bool {
        self.lock.locked
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(***)")
    }
}

impl fmt::Display for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(***)")
    }
}

// ---------------------------------------------------------------------------
// SecretBytes<N>
// ---------------------------------------------------------------------------

/// Fixed-size secret such as a PBKDF2-derived key. Zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes<const N: usize> {
    bytes: [u8; N],
    #[zeroize(skip)]
    lock: PageLock,
}

impl<const N: usize> SecretBytes<N> {
    /// Move `data` into a new secret. The lock is taken at the current
    /// address; a later move leaves a stale (harmless) unlock on drop.
    #[must_use]
    pub fn new(data: [u8; N]) -> Self {
        let mut secret = Self {
            bytes: data,
            lock: PageLock::none(),
        };
        secret.lock = PageLock::acquire(secret.bytes.as_ptr(), N);
        secret
    }

    /// All-zero secret, to be filled in place with [`Self::expose_mut`].
    #[must_use]
    pub fn zeroed() -> Self {
        Self::new([0u8; N])
    }

    /// Borrow the raw bytes.
    #[must_use]
    pub const fn expose(&self) -> &[u8; N] {
        &self.bytes
    }

    /// Mutable access for in-place derivation (PBKDF2 output, RNG fill).
    pub fn expose_mut(&mut self) -> &mut [u8; N] {
        &mut self.bytes
    }
}

impl<const N: usize> fmt::Debug for SecretBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes<{N}>(***)")
    }
}

impl<const N: usize> fmt::Display for SecretBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes<{N}>(***)")
    }
}

impl<const N: usize> From<[u8; N]> for SecretBytes<N> {
    fn from(data: [u8; N]) -> Self {
        Self::new(data)
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod platform {
    pub(super) fn mlock(ptr: *const u8, len: usize) -> bool {
        if len == 0 {
            return true;
        }
        // SAFETY: mlock accepts any pointer/length; invalid ranges yield ENOMEM.
        unsafe { libc::mlock(ptr.cast(), len) == 0 }
    }

    pub(super) fn munlock(ptr: *const u8, len: usize) {
        if len == 0 {
            return;
        }
        // SAFETY: munlock failure is non-critical and has no memory effects.
        unsafe {
            libc::munlock(ptr.cast(), len);
        }
    }
}

#[cfg(not(unix))]
mod platform {
    pub(super) fn mlock(_ptr: *const u8, _len: usize) -> bool {
        false
    }

    pub(super) fn munlock(_ptr: *const u8, _len: usize) {}
}
