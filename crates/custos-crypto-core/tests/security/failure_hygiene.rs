//! Failures must not reveal secrets or take a measurably cheaper path.

use std::time::{Duration, Instant};

use custos_crypto_core::{CipherEngine, CryptoConfig, CryptoError, PasswordHasher, RandomGenerator};

const PASSWORD: &str = "correct horse battery staple";

fn hasher() -> PasswordHasher {
    PasswordHasher::new(&CryptoConfig::default(), RandomGenerator::os())
        .expect("hasher should build")
}

fn cipher() -> CipherEngine {
    CipherEngine::new(&CryptoConfig::default(), RandomGenerator::os())
        .expect("engine should build")
}

/// Median of a few runs, to damp scheduler noise.
fn median_time(mut f: impl FnMut()) -> Duration {
    let mut samples: Vec<Duration> = (0..5)
        .map(|_| {
            let start = Instant::now();
            f();
            start.elapsed()
        })
        .collect();
    samples.sort();
    samples[2]
}

#[test]
fn error_messages_never_contain_inputs() {
    let engine = cipher();
    let blob = engine.encrypt_string("top secret plaintext", PASSWORD).expect("encrypt");

    let errors: Vec<CryptoError> = vec![
        engine.decrypt_string(&blob, "wrong password").unwrap_err(),
        engine.decrypt_string("garbage-blob", PASSWORD).unwrap_err(),
        engine.encrypt_string("top secret plaintext", "").unwrap_err(),
    ];
    for err in errors {
        let rendered = format!("{err} {err:?}");
        assert!(!rendered.contains("top secret"), "{rendered}");
        assert!(!rendered.contains("wrong password"), "{rendered}");
        assert!(!rendered.contains(PASSWORD), "{rendered}");
    }
}

#[test]
fn ciphertext_does_not_contain_plaintext() {
    let plaintext = b"ATTACK AT DAWN ATTACK AT DAWN ATTACK AT DAWN";
    let blob = cipher().encrypt_bytes(plaintext, PASSWORD).expect("encrypt");
    let bytes = blob.to_bytes();
    assert!(!bytes.windows(6).any(|w| w == b"ATTACK"));
}

#[test]
fn malformed_record_costs_a_full_derivation() {
    let hasher = hasher();
    let record = hasher.hash(PASSWORD).expect("hash should succeed");

    let genuine = median_time(|| {
        std::hint::black_box(hasher.verify("not the password", &record));
    });
    let malformed = median_time(|| {
        std::hint::black_box(hasher.verify("not the password", "not-a-record"));
    });

    assert!(
        malformed * 2 > genuine,
        "malformed-record rejection too fast: {malformed:?} vs {genuine:?}"
    );
}

#[test]
fn malformed_blob_costs_a_full_derivation() {
    let engine = cipher();
    let blob = engine.encrypt_string("payload", PASSWORD).expect("encrypt");

    let genuine = median_time(|| {
        std::hint::black_box(engine.decrypt_string(&blob, "not the password").is_err());
    });
    let malformed = median_time(|| {
        std::hint::black_box(engine.decrypt_string("AAAA", "not the password").is_err());
    });

    assert!(
        malformed * 2 > genuine,
        "malformed-blob rejection too fast: {malformed:?} vs {genuine:?}"
    );
}

#[test]
fn under_iterated_record_costs_the_configured_derivation() {
    let old_record = hasher().hash(PASSWORD).expect("hash should succeed");
    let config = CryptoConfig {
        pbkdf2_iterations: 500_000,
        ..CryptoConfig::default()
    };
    let stronger = PasswordHasher::new(&config, RandomGenerator::os()).expect("hasher should build");
    assert!(stronger.needs_rehash(&old_record));

    let under_iterated = median_time(|| {
        std::hint::black_box(stronger.verify("not the password", &old_record));
    });
    let malformed = median_time(|| {
        std::hint::black_box(stronger.verify("not the password", "not-a-record"));
    });

    assert!(
        under_iterated * 2 > malformed,
        "under-iterated rejection too fast: {under_iterated:?} vs {malformed:?}"
    );
    assert!(stronger.verify(PASSWORD, &old_record));
}
