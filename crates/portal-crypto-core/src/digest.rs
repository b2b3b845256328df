//! SHA-256 digests and the client environment fingerprint.

use ring::digest;
use serde::{Deserialize, Serialize};

use crate::encoding::encode_base64;

/// SHA-256 over the UTF-8 bytes of `text`, base64-encoded.
#[must_use]
pub fn sha256_base64(text: &str) -> String {
    sha256_bytes_base64(text.as_bytes())
}

/// SHA-256 over raw bytes, base64-encoded.
#[must_use]
pub fn sha256_bytes_base64(bytes: &[u8]) -> String {
    encode_base64(digest::digest(&digest::SHA256, bytes).as_ref())
}

/// Client attributes that feed the environment fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientEnvironment {
    pub user_agent: String,
    pub language: String,
    pub screen_width: u32,
    pub screen_height: u32,
    /// Minutes behind UTC, as reported by the client clock.
    pub timezone_offset_minutes: i32,
}

/// Hash `userAgent|language|WIDTHxHEIGHT|timezoneOffset` into a fingerprint.
///
/// Low entropy by construction. Use it as an auxiliary risk signal only;
/// it must never be sufficient to authenticate anyone.
#[must_use]
pub fn generate_browser_fingerprint(env: &ClientEnvironment) -> String {
    let components = format!(
        "{}|{}|{}x{}|{}",
        env.user_agent,
        env.language,
        env.screen_width,
        env.screen_height,
        env.timezone_offset_minutes
    );
    sha256_base64(&components)
}
