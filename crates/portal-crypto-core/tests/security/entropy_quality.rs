//! Entropy smoke tests for challenge and nonce generation.
//!
//! Shannon entropy of uniform random bytes approaches 8.0 bits/byte as the
//! sample grows. Thresholds below sit well under the expected value for each
//! sample size so they only trip on a degenerate CSPRNG (all zeros, short
//! cycles), not on natural variance.
//!
//! | Sample size | Expected entropy | Threshold |
//! |-------------|-----------------|-----------|
//! | 1 KB        | ~7.81           | 7.5       |
//! | 64 KB       | ~7.997          | 7.99      |

use std::collections::HashSet;

use portal_crypto_core::encoding::decode_base64;
use portal_crypto_core::random::{generate_challenge, generate_id, generate_nonce};

/// Shannon entropy of a byte slice (bits per byte).
#[allow(clippy::cast_precision_loss)]
fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut freq = [0u64; 256];
    for &b in data {
        freq[b as usize] = freq[b as usize].saturating_add(1);
    }
    let len = data.len() as f64;
    freq.iter()
        .filter(|&&f| f > 0)
        .map(|&f| {
            let p = f as f64 / len;
            -p * p.log2()
        })
        .sum()
}

#[test]
fn challenge_1kb_entropy() {
    let bytes = generate_challenge(1024);
    let entropy = shannon_entropy(&bytes);
    assert!(
        entropy > 7.5,
        "generate_challenge(1024) entropy too low: {entropy:.4} (expected > 7.5)"
    );
}

#[test]
fn challenge_64kb_entropy() {
    let bytes = generate_challenge(65536);
    let entropy = shannon_entropy(&bytes);
    assert!(
        entropy > 7.99,
        "generate_challenge(65536) entropy too low: {entropy:.4} (expected > 7.99)"
    );
}

#[test]
fn concatenated_nonces_have_high_entropy() {
    let mut pooled = Vec::with_capacity(32 * 64);
    for _ in 0..64 {
        pooled.extend(decode_base64(&generate_nonce()).expect("nonce is base64"));
    }
    let entropy = shannon_entropy(&pooled);
    assert!(entropy > 7.5, "pooled nonce entropy too low: {entropy:.4}");
}

#[test]
fn ids_do_not_repeat() {
    let ids: HashSet<String> = (0..10_000).map(|_| generate_id()).collect();
    assert_eq!(ids.len(), 10_000, "16-byte ids collided");
}
