//! Fail-closed input predicates and the input sanitizer.
//!
//! Every predicate here returns `false` on malformed input instead of
//! propagating an error.

use serde_json::Value;
use url::Url;

use crate::encoding::decode_base64;

/// Minimum decoded length of a WebAuthn credential id, in bytes.
pub const MIN_CREDENTIAL_ID_LEN: usize = 16;

/// Maximum decoded length of a WebAuthn credential id, in bytes.
pub const MAX_CREDENTIAL_ID_LEN: usize = 512;

/// Default truncation limit for [`sanitize_input`].
pub const DEFAULT_MAX_INPUT_LEN: usize = 255;

/// Characters stripped by [`sanitize_input`].
const STRIPPED_CHARS: [char; 5] = ['<', '>', '"', '\'', '`'];

/// Separator set for collapsing: Unicode `White_Space` plus the byte-order
/// mark U+FEFF, minus NEL U+0085.
fn is_text_space(c: char) -> bool {
    matches!(c, '\u{FEFF}') || (c.is_whitespace() && !matches!(c, '\u{0085}'))
}

/// URL schemes accepted by [`is_valid_url`].
const ALLOWED_SCHEMES: [&str; 4] = ["https", "http", "blob", "data"];

/// `true` iff `id` is base64 decoding to 16..=512 bytes.
#[must_use]
pub fn is_valid_credential_id(id: &str) -> bool {
    decode_base64(id).is_ok_and(|raw| {
        (MIN_CREDENTIAL_ID_LEN..=MAX_CREDENTIAL_ID_LEN).contains(&raw.len())
    })
}

/// Best-effort denylist filter for short free-text fields.
///
/// Truncates to `max_len` characters, removes `< > " ' \``, trims, and
/// collapses internal whitespace runs (U+FEFF included) into a single
/// space. This is not an HTML sanitizer: output still needs context-aware
/// escaping when rendered.
#[must_use]
pub fn sanitize_input(input: &str, max_len: usize) -> String {
    let filtered: String = input
        .chars()
        .take(max_len)
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .collect();

    filtered
        .split(is_text_space)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// [`sanitize_input`] for untyped JSON input; anything but a string yields `""`.
#[must_use]
pub fn sanitize_value(input: &Value, max_len: usize) -> String {
    match input {
        Value::String(s) => sanitize_input(s, max_len),
        _ => String::new(),
    }
}

/// `true` iff `url` parses and uses one of the https, http, blob, or data schemes.
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    Url::parse(url).is_ok_and(|parsed| ALLOWED_SCHEMES.contains(&parsed.scheme()))
}
