//! NIST SP 800-38D: AES-256-GCM test cases 13, 14 and 15 (no AAD).
//!
//! Each vector is checked against `ring`'s one-shot seal and against the
//! streaming encryptor/decryptor used for files, fed in several chunk sizes.

use custos_crypto_core::cipher::{GcmDecryptor, GcmEncryptor, TAG_LEN};
use ring::aead;

use super::hex;

struct Vector {
    key: &'static str,
    iv: &'static str,
    plaintext: &'static str,
    ciphertext: &'static str,
    tag: &'static str,
}

const TEST_CASE_13: Vector = Vector {
    key: "0000000000000000000000000000000000000000000000000000000000000000",
    iv: "000000000000000000000000",
    plaintext: "",
    ciphertext: "",
    tag: "530f8afbc74536b9a963b4f1c4cb738b",
};

const TEST_CASE_14: Vector = Vector {
    key: "0000000000000000000000000000000000000000000000000000000000000000",
    iv: "000000000000000000000000",
    plaintext: "00000000000000000000000000000000",
    ciphertext: "cea7403d4d606b6e074ec5d3baf39d18",
    tag: "d0d1c8a799996bf0265b98b5d48ab919",
};

const TEST_CASE_15: Vector = Vector {
    key: "feffe9928665731c6d6a8f9467308308feffe9928665731c6d6a8f9467308308",
    iv: "cafebabefacedbaddecaf888",
    plaintext: "d9313225f88406e5a55909c5aff5269a86a7a9531534f7da2e4c303d8a318a72\
                1c3c0c95956809532fcf0e2449a6b525b16aedf5aa0de657ba637b391aafd255",
    ciphertext: "522dc1f099567d07f47f37a32a84427d643a8cdcbfe5c0c97598a2bd2555d1aa\
                 8cb08e48590dbb3da7b08b1056828838c5f61e6393ba7a0abcc9f662898015ad",
    tag: "b094dac5d93471bdec1a502270e3cc6c",
};

fn key_and_iv(v: &Vector) -> ([u8; 32], [u8; 12]) {
    let key: [u8; 32] = hex(v.key).try_into().expect("32-byte key");
    let iv: [u8; 12] = hex(v.iv).try_into().expect("12-byte iv");
    (key, iv)
}

fn check_ring(v: &Vector) {
    let (key, iv) = key_and_iv(v);
    let sealing = aead::LessSafeKey::new(
        aead::UnboundKey::new(&aead::AES_256_GCM, &key).expect("key should be valid"),
    );
    let mut in_out = hex(v.plaintext);
    let tag = sealing
        .seal_in_place_separate_tag(
            aead::Nonce::assume_unique_for_key(iv),
            aead::Aad::empty(),
            &mut in_out,
        )
        .expect("seal should succeed");
    assert_eq!(in_out, hex(v.ciphertext));
    assert_eq!(tag.as_ref(), hex(v.tag).as_slice());
}

fn check_stream(v: &Vector) {
    let (key, iv) = key_and_iv(v);
    for chunk in [1, 5, 16, 64] {
        let mut enc = GcmEncryptor::new(&key, &iv);
        let mut buf = hex(v.plaintext);
        for piece in buf.chunks_mut(chunk) {
            enc.update(piece).expect("update should succeed");
        }
        assert_eq!(buf, hex(v.ciphertext), "chunk {chunk}");
        assert_eq!(enc.finalize().as_slice(), hex(v.tag).as_slice(), "chunk {chunk}");

        let tag: [u8; TAG_LEN] = hex(v.tag).try_into().expect("16-byte tag");
        let mut dec = GcmDecryptor::new(&key, &iv);
        for piece in buf.chunks_mut(chunk) {
            dec.update(piece).expect("update should succeed");
        }
        dec.finalize(&tag).expect("tag should verify");
        assert_eq!(buf, hex(v.plaintext), "chunk {chunk}");
    }
}

#[test]
fn nist_test_case_13_empty_plaintext() {
    check_ring(&TEST_CASE_13);
    check_stream(&TEST_CASE_13);
}

#[test]
fn nist_test_case_14_single_block() {
    check_ring(&TEST_CASE_14);
    check_stream(&TEST_CASE_14);
}

#[test]
fn nist_test_case_15_four_blocks() {
    check_ring(&TEST_CASE_15);
    check_stream(&TEST_CASE_15);
}

#[test]
fn nist_test_case_15_wrong_tag_rejected() {
    let (key, iv) = key_and_iv(&TEST_CASE_15);
    let mut tag: [u8; TAG_LEN] = hex(TEST_CASE_15.tag).try_into().expect("16-byte tag");
    tag[0] ^= 0x01;
    let mut dec = GcmDecryptor::new(&key, &iv);
    let mut buf = hex(TEST_CASE_15.ciphertext);
    dec.update(&mut buf).expect("update should succeed");
    assert!(dec.finalize(&tag).is_err());
}
