//! Key material must never appear in `Debug` output.

use portal_crypto_core::kdf::derive_key_from_password;
use portal_crypto_core::memory::{SecretBuffer, SecretBytes};
use portal_crypto_core::signing::generate_key_pair;
use portal_crypto_core::symmetric::AesKey;

#[test]
fn aes_key_debug_is_masked() {
    let key = AesKey::generate().expect("keygen");
    let debug = format!("{key:?}");
    assert!(debug.contains("***"), "unexpected AesKey debug: {debug}");
}

#[test]
fn derived_key_debug_is_masked() {
    let key = derive_key_from_password("hunter2", "salt").expect("derive");
    assert!(!format!("{key:?}").contains("hunter2"));
    assert!(format!("{key:?}").contains("***"));
}

#[test]
fn signing_key_pair_debug_is_masked() {
    let kp = generate_key_pair().expect("keygen");
    assert_eq!(format!("{kp:?}"), "SigningKeyPair(***)");
}

#[test]
fn secret_containers_mask_bytes() {
    let buf = SecretBuffer::new(b"jwt-signing-secret");
    assert_eq!(format!("{buf:?}"), "SecretBuffer(***)");
    let bytes = SecretBytes::new([7u8; 16]);
    assert_eq!(format!("{bytes:?}"), "SecretBytes<16>(***)");
}
