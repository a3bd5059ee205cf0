//! Streaming file encryption.
//!
//! File layout matches [`EncryptedBlob`](super::EncryptedBlob):
//! `salt (32) || iv (12) || ciphertext || tag (16)`. Input is processed in
//! `file_chunk_size` pieces so memory use does not grow with file size.
//!
//! Output goes to a randomly named temporary file next to the destination and
//! is renamed into place only once everything succeeded. For decryption that
//! means after the tag has been verified, so unauthenticated plaintext never
//! appears under the destination name.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use super::stream::{GcmDecryptor, GcmEncryptor, NONCE_LEN, TAG_LEN};
use super::{require_password, CipherEngine, HEADER_LEN, SALT_LEN};
use crate::error::CryptoError;
use crate::random::RandomGenerator;

impl CipherEngine {
    /// Encrypt the file at `input` into `output`.
    ///
    /// An existing `output` is replaced only on success.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidInput`: empty password
    /// - `CryptoError::Io`: `input` unreadable or `output` directory not writable
    /// - `CryptoError::CryptoUnavailable`: CSPRNG failure
    #[tracing::instrument(level = "debug", skip_all, fields(chunk_size = self.chunk_size))]
    pub fn encrypt_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        password: &str,
    ) -> Result<(), CryptoError> {
        require_password(password)?;
        let mut reader = File::open(input.as_ref())?;

        let salt: [u8; SALT_LEN] = self.rng.random_array()?;
        let iv: [u8; NONCE_LEN] = self.rng.random_array()?;
        let mut encryptor = {
            let key = self.derive(password, &salt)?;
            GcmEncryptor::new(key.expose(), &iv)
        };

        let mut out = PendingOutput::create(output.as_ref(), &self.rng)?;
        out.write_all(&salt)?;
        out.write_all(&iv)?;

        let mut buf = Zeroizing::new(vec![0u8; self.chunk_size]);
        let mut total: u64 = 0;
        loop {
            let n = read_chunk(&mut reader, &mut buf)?;
            if n == 0 {
                break;
            }
            let chunk = &mut buf[..n];
            encryptor.update(chunk)?;
            out.write_all(chunk)?;
            total = total.saturating_add(n as u64);
        }
        out.write_all(&encryptor.finalize())?;
        out.commit()?;

        tracing::debug!(bytes = total, "file encrypted");
        Ok(())
    }

    /// Decrypt a file written by [`Self::encrypt_file`].
    ///
    /// The trailing 16 bytes are held back as the tag while the rest is
    /// decrypted into a temporary file; that file is discarded unless the tag
    /// verifies.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidInput`: empty password
    /// - `CryptoError::Format`: shorter than the 44-byte header plus tag
    /// - `CryptoError::AuthenticationFailure`: wrong password or modified file
    /// - `CryptoError::Io`: read or write failure
    #[tracing::instrument(level = "debug", skip_all, fields(chunk_size = self.chunk_size))]
    pub fn decrypt_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        password: &str,
    ) -> Result<(), CryptoError> {
        require_password(password)?;
        let mut reader = File::open(input.as_ref())?;

        let mut header = [0u8; HEADER_LEN];
        let header_len = read_chunk(&mut reader, &mut header)?;
        if header_len < HEADER_LEN {
            self.equalize_timing(password);
            return Err(CryptoError::Format(format!(
                "encrypted file too short: {header_len} bytes of {HEADER_LEN}-byte header"
            )));
        }
        let (salt, iv) = header.split_at(SALT_LEN);
        let mut salt_bytes = [0u8; SALT_LEN];
        salt_bytes.copy_from_slice(salt);
        let mut iv_bytes = [0u8; NONCE_LEN];
        iv_bytes.copy_from_slice(iv);

        let mut decryptor = {
            let key = self.derive(password, &salt_bytes)?;
            GcmDecryptor::new(key.expose(), &iv_bytes)
        };

        let mut out = PendingOutput::create(output.as_ref(), &self.rng)?;
        let mut buf = Zeroizing::new(vec![0u8; self.chunk_size.saturating_add(TAG_LEN)]);
        let mut held = 0usize;
        let mut total: u64 = 0;
        loop {
            let n = read_chunk(&mut reader, &mut buf[held..])?;
            if n == 0 {
                break;
            }
            let available = held.saturating_add(n);
            // Everything except the last TAG_LEN bytes seen so far is ciphertext.
            let ready = available.saturating_sub(TAG_LEN);
            if ready > 0 {
                let chunk = &mut buf[..ready];
                decryptor.update(chunk)?;
                out.write_all(chunk)?;
                buf.copy_within(ready..available, 0);
                total = total.saturating_add(ready as u64);
            }
            held = available.saturating_sub(ready);
        }

        if held < TAG_LEN {
            return Err(CryptoError::Format(
                "encrypted file truncated: authentication tag missing".into(),
            ));
        }
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&buf[..TAG_LEN]);

        if let Err(err) = decryptor.finalize(&tag) {
            tracing::debug!("file failed authentication; discarding output");
            return Err(err);
        }
        out.commit()?;

        tracing::debug!(bytes = total, "file decrypted");
        Ok(())
    }
}

/// Fill as much of `buf` as the reader can supply; returns 0 only at EOF.
fn read_chunk(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled = filled.saturating_add(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ---------------------------------------------------------------------------
// Temporary output
// ---------------------------------------------------------------------------

/// A temporary file beside the destination. Removed on drop unless
/// [`PendingOutput::commit`] renamed it into place.
struct PendingOutput {
    writer: Option<BufWriter<File>>,
    tmp_path: PathBuf,
    final_path: PathBuf,
}

impl PendingOutput {
    fn create(final_path: &Path, rng: &RandomGenerator) -> Result<Self, CryptoError> {
        let tmp_path = random_tmp_path(final_path, rng)?;

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(&tmp_path)?;

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            tmp_path,
            final_path: final_path.to_path_buf(),
        })
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        match self.writer.as_mut() {
            Some(writer) => Ok(writer.write_all(data)?),
            None => Err(CryptoError::Io(io::Error::other("output already closed"))),
        }
    }

    /// Flush, fsync, and rename over the destination.
    fn commit(mut self) -> Result<(), CryptoError> {
        let Some(writer) = self.writer.take() else {
            return Err(CryptoError::Io(io::Error::other("output already closed")));
        };
        let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.tmp_path, &self.final_path)?;
        // Renamed away: nothing left for Drop to clean up.
        self.tmp_path = PathBuf::new();

        #[cfg(unix)]
        {
            if let Some(parent) = self.final_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                File::open(parent)?.sync_all()?;
            }
        }
        Ok(())
    }
}

impl Drop for PendingOutput {
    fn drop(&mut self) {
        drop(self.writer.take());
        if !self.tmp_path.as_os_str().is_empty() {
            if let Err(e) = fs::remove_file(&self.tmp_path) {
                tracing::warn!(error = %e, "failed to remove temporary output file");
            }
        }
    }
}

/// `.<name>.<16 hex chars>.tmp` in the destination's directory.
fn random_tmp_path(final_path: &Path, rng: &RandomGenerator) -> Result<PathBuf, CryptoError> {
    let file_name = final_path
        .file_name()
        .ok_or_else(|| CryptoError::InvalidInput("output path has no file name".into()))?
        .to_string_lossy();
    let suffix: String = rng
        .random_array::<8>()?
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    Ok(final_path.with_file_name(format!(".{file_name}.{suffix}.tmp")))
}
