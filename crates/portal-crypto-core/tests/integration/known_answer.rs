//! Known-answer vectors for the primitives the token format depends on.

use portal_crypto_core::digest::sha256_base64;
use portal_crypto_core::encoding::{encode_base64, encode_base64url};

#[test]
fn sha256_fips_180_vector() {
    // FIPS 180-2 Appendix B.2
    assert_eq!(
        sha256_base64("abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq"),
        "JI1qYdIGOLjlwCaTDD5gOaM85Flk/yFn9uzt1BnbBsE="
    );
}

#[test]
fn base64_rfc4648_vectors() {
    assert_eq!(encode_base64(b"f"), "Zg==");
    assert_eq!(encode_base64(b"fo"), "Zm8=");
    assert_eq!(encode_base64(b"foo"), "Zm9v");
    assert_eq!(encode_base64(b"foobar"), "Zm9vYmFy");
    assert_eq!(encode_base64url(b"f"), "Zg");
    assert_eq!(encode_base64url(b"fo"), "Zm8");
}

#[test]
fn token_header_encoding_is_stable() {
    assert_eq!(
        encode_base64url(br#"{"alg":"HS256","typ":"JWT"}"#),
        "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"
    );
}
