//! Timing side-channel check for HMAC verification.
//!
//! Uses Welch's t-test to compare verification time for a tag that matches
//! against one that differs in its first byte. An early-exit comparison would
//! make the mismatching class measurably faster; a constant-time comparison
//! keeps |t| below 4.5.
//!
//! The test is statistical and sensitive to machine load, so it is ignored by
//! default. Run it with `cargo test --release -- --ignored`.

use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use custos_crypto_core::mac::MacEngine;

/// Number of timing samples per class.
const SAMPLES: usize = 20_000;

/// Welch's t-test threshold. |t| < 4.5 means no detectable timing difference.
const T_THRESHOLD: f64 = 4.5;

/// `t = (mean_a - mean_b) / sqrt(var_a/n_a + var_b/n_b)`
#[allow(clippy::cast_precision_loss)]
fn welch_t_statistic(a: &[f64], b: &[f64]) -> f64 {
    if a.len() < 2 || b.len() < 2 {
        return f64::NAN;
    }

    let n_a = a.len() as f64;
    let n_b = b.len() as f64;

    let mean_a: f64 = a.iter().sum::<f64>() / n_a;
    let mean_b: f64 = b.iter().sum::<f64>() / n_b;

    let var_a: f64 = a.iter().map(|x| (x - mean_a).powi(2)).sum::<f64>() / (n_a - 1.0);
    let var_b: f64 = b.iter().map(|x| (x - mean_b).powi(2)).sum::<f64>() / (n_b - 1.0);

    let denominator = (var_a / n_a + var_b / n_b).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }

    (mean_a - mean_b) / denominator
}

#[inline(never)]
fn black_box_verify(engine: &MacEngine, message: &[u8], key: &[u8], tag: &str) -> bool {
    std::hint::black_box(engine.verify_hmac(message, key, tag))
}

#[test]
#[ignore = "statistical timing test; run in release mode on an idle machine"]
fn verify_hmac_constant_time_no_timing_leak() {
    let engine = MacEngine::default();
    let message = b"transfer 100 to account 42";
    let key = b"shared secret key";

    let valid = engine.create_hmac(message, key).expect("hmac should succeed");
    let mut raw = STANDARD.decode(&valid).expect("base64");
    raw[0] ^= 0xFF;
    let invalid = STANDARD.encode(raw);

    for _ in 0..1000 {
        black_box_verify(&engine, message, key, &valid);
        black_box_verify(&engine, message, key, &invalid);
    }

    let mut times_a = Vec::with_capacity(SAMPLES);
    let mut times_b = Vec::with_capacity(SAMPLES);
    for _ in 0..SAMPLES {
        let start = Instant::now();
        let _ = black_box_verify(&engine, message, key, &valid);
        let elapsed_a = start.elapsed().as_nanos();

        let start = Instant::now();
        let _ = black_box_verify(&engine, message, key, &invalid);
        let elapsed_b = start.elapsed().as_nanos();

        #[allow(clippy::cast_precision_loss)]
        {
            times_a.push(elapsed_a as f64);
            times_b.push(elapsed_b as f64);
        }
    }

    let abs_t = welch_t_statistic(&times_a, &times_b).abs();
    eprintln!("verify_hmac timing: |t| = {abs_t:.2} (threshold {T_THRESHOLD}), {SAMPLES} samples per class");
    assert!(
        abs_t < T_THRESHOLD,
        "timing difference detected in verify_hmac: |t| = {abs_t:.2}"
    );
}

#[test]
fn welch_t_test_identical_distributions() {
    let a = vec![1.0; 100];
    let b = vec![1.0; 100];
    assert!(welch_t_statistic(&a, &b).abs() < 0.001);
}

#[test]
fn welch_t_test_different_distributions() {
    let a: Vec<f64> = (0..1000).map(|i| 100.0 + f64::from(i % 3)).collect();
    let b: Vec<f64> = (0..1000).map(|i| 200.0 + f64::from(i % 3)).collect();
    assert!(welch_t_statistic(&a, &b).abs() > 100.0);
}
