//! HMAC-SHA256: RFC 4231 test cases 1, 2, 3, 4 and 6.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use custos_crypto_core::mac::MacEngine;

use super::hex;

fn check(key: &[u8], message: &[u8], expected_hex: &str) {
    let engine = MacEngine::default();
    let tag = engine.create_hmac(message, key).expect("hmac should succeed");
    assert_eq!(STANDARD.decode(&tag).expect("base64"), hex(expected_hex));
    assert!(engine.verify_hmac(message, key, &tag));
}

#[test]
fn rfc4231_case_1() {
    check(
        &[0x0b; 20],
        b"Hi There",
        "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7",
    );
}

#[test]
fn rfc4231_case_2() {
    check(
        b"Jefe",
        b"what do ya want for nothing?",
        "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843",
    );
}

#[test]
fn rfc4231_case_3() {
    check(
        &[0xaa; 20],
        &[0xdd; 50],
        "773ea91e36800e46854db8ebd09181a72959098b3ef8c122d9635514ced565fe",
    );
}

#[test]
fn rfc4231_case_4() {
    let key: Vec<u8> = (0x01..=0x19).collect();
    check(
        &key,
        &[0xcd; 50],
        "82558a389a443c0ea4cc819899f2083a85f0faa3e578f8077a2e3ff46729665b",
    );
}

/// Key longer than the SHA-256 block size.
#[test]
fn rfc4231_case_6() {
    check(
        &[0xaa; 131],
        b"Test Using Larger Than Block-Size Key - Hash Key First",
        "60e431591ee0b67f0d8a26aacbf5b77f8e0bc6213728c5140546040f0ee37f54",
    );
}
