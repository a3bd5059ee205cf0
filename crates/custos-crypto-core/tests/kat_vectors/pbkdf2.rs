//! PBKDF2-HMAC-SHA256: RFC 7914 §11 and a floor-strength vector.

use std::num::NonZeroU32;

use custos_crypto_core::kdf::derive_key;
use custos_crypto_core::CryptoError;
use ring::pbkdf2;

use super::hex;

fn ring_pbkdf2(password: &[u8], salt: &[u8], iterations: u32, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        NonZeroU32::new(iterations).expect("non-zero"),
        salt,
        password,
        &mut out,
    );
    out
}

/// RFC 7914 §11: P="passwd", S="salt", c=1, dkLen=64.
#[test]
fn rfc7914_passwd_salt_c1() {
    let expected = hex(
        "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc\
         49ca9cccf179b645991664b39d77ef317c71b845b1e30bd509112041d3a19783",
    );
    assert_eq!(ring_pbkdf2(b"passwd", b"salt", 1, 64), expected);
}

/// RFC 7914 §11: P="Password", S="NaCl", c=80000, dkLen=64.
#[test]
fn rfc7914_password_nacl_c80000() {
    let expected = hex(
        "4ddcd8f60b98be21830cee5ef22701f9641a4418d04c0414aeff08876b34ab56\
         a1d425a1225833549adb841b51c9b3176a272bdebba1d078478f62b397f33c8d",
    );
    assert_eq!(ring_pbkdf2(b"Password", b"NaCl", 80_000, 64), expected);
}

/// The RFC 7914 work factor is below our floor, so `derive_key` refuses it.
#[test]
fn derive_key_refuses_rfc_work_factor() {
    let err = derive_key(b"Password", b"NaClNaClNaClNaCl", 80_000).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidInput(_)));
}

/// `derive_key` at the 100,000-iteration floor with a 32-byte salt.
#[test]
fn derive_key_at_floor() {
    let key = derive_key(b"password", b"0123456789abcdef0123456789abcdef", 100_000)
        .expect("derive should succeed");
    assert_eq!(
        key.expose().as_slice(),
        hex("db04bd021286d3e9d4685fde494b984ea16d998a4902065fabe25aacaac774ef").as_slice()
    );
}
