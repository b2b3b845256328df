//! Key pair lifecycle: generate, seal the private key under a password,
//! reopen it, and keep signing with it.

use portal_crypto_core::encoding::{decode_base64, encode_base64, encode_webauthn_data};
use portal_crypto_core::kdf::derive_key_from_password;
use portal_crypto_core::random::generate_challenge;
use portal_crypto_core::signing::{generate_key_pair, sign_data, verify_signature, SigningKeyPair};
use portal_crypto_core::symmetric::{decrypt_data, encrypt_data};
use portal_crypto_core::validation::is_valid_credential_id;

#[test]
fn sealed_private_key_survives_reopen() {
    let original = generate_key_pair().expect("keygen");
    let wrapping = derive_key_from_password("master password", "alice").expect("derive");

    let pkcs8_b64 = encode_base64(original.pkcs8().expose());
    let sealed = encrypt_data(&pkcs8_b64, &wrapping).expect("seal");

    let rewrapping = derive_key_from_password("master password", "alice").expect("derive");
    let reopened_b64 = decrypt_data(&sealed, &rewrapping).expect("open");
    let reopened =
        SigningKeyPair::from_pkcs8(&decode_base64(&reopened_b64).expect("b64")).expect("parse");

    let challenge = generate_challenge(32);
    let sig = sign_data(&reopened, &challenge).expect("sign");
    assert!(verify_signature(original.public_key(), &sig, &challenge).expect("verify"));
}

#[test]
fn assertion_over_text_client_data() {
    let kp = generate_key_pair().expect("keygen");
    let client_data = encode_webauthn_data(r#"{"type":"webauthn.get"}"#.into());
    let sig = sign_data(&kp, &client_data).expect("sign");
    assert!(verify_signature(kp.public_key(), &sig, &client_data).expect("verify"));
}

#[test]
fn random_challenge_is_a_valid_credential_id() {
    let id = encode_base64(&generate_challenge(32));
    assert!(is_valid_credential_id(&id));
}
