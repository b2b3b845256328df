//! Constant-time equality.
//!
//! Only the content comparison is constant-time: inputs of different length
//! return `false` immediately, so the length itself can leak through timing.

/// Compare two byte slices without short-circuiting on the first mismatch.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    std::hint::black_box(diff) == 0
}

/// [`constant_time_eq`] over the UTF-8 bytes of two strings.
#[must_use]
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}
