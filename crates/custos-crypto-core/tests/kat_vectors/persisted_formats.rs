//! Frozen records and blobs. These must keep verifying across releases,
//! since callers persist them.

use custos_crypto_core::hasher::{PasswordHasher, StoredRecord};
use custos_crypto_core::{CipherEngine, CryptoConfig, RandomGenerator};

/// "Tr0ub4dor&3", salt 0x07 * 32, 100,000 iterations.
const CURRENT_RECORD: &str = "100000:BwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwc=:\
                              FJ6O4p+/+eJmj8m8ypXz2/zaqKm4UrHGV44G/pKfXRo=";

/// "abc123", salt bytes 0..16, single SHA-256.
const LEGACY_RECORD: &str = "AAECAwQFBgcICQoLDA0OD9ZeEBmLtv8TkRTWL8tAyKlsuXdOuuPdwdxVKRznozRH";

/// "hello world" under "secret": salt 0x11 * 32, IV 0x22 * 12.
const BLOB: &str = "EREREREREREREREREREREREREREREREREREREREREREiIiIiIiIiIiIiIiJL8b38\
                    Lbq8AR8f/mqi0KDy6FMax9ElNFEkwV4=";

fn hasher() -> PasswordHasher {
    PasswordHasher::new(&CryptoConfig::default(), RandomGenerator::os())
        .expect("hasher should build")
}

#[test]
fn current_record_verifies() {
    let hasher = hasher();
    assert!(hasher.verify("Tr0ub4dor&3", CURRENT_RECORD));
    assert!(!hasher.verify("Tr0ub4dor&4", CURRENT_RECORD));
    assert!(!hasher.needs_rehash(CURRENT_RECORD));
}

#[test]
fn current_record_reencodes_identically() {
    let Ok(StoredRecord::Current(record)) = CURRENT_RECORD.parse::<StoredRecord>() else {
        panic!("fixture should parse as a current record");
    };
    assert_eq!(record.iterations(), 100_000);
    assert_eq!(record.salt(), &[0x07; 32]);
    assert_eq!(record.encode(), CURRENT_RECORD);
}

#[test]
fn legacy_record_verifies() {
    let hasher = hasher();
    assert!(hasher.verify("abc123", LEGACY_RECORD));
    assert!(!hasher.verify("abc124", LEGACY_RECORD));
    assert!(matches!(
        LEGACY_RECORD.parse::<StoredRecord>(),
        Ok(StoredRecord::Legacy(_))
    ));
}

#[test]
fn frozen_blob_decrypts() {
    let engine = CipherEngine::new(&CryptoConfig::default(), RandomGenerator::os())
        .expect("engine should build");
    assert_eq!(
        engine.decrypt_string(BLOB, "secret").expect("decrypt should succeed"),
        "hello world"
    );
}
