//! Timing side-channel validation for `constant_time_eq`.
//!
//! Uses Welch's t-test to check that a mismatch in the first byte takes as
//! long as a mismatch in the last byte, i.e. the comparison walks every byte
//! instead of returning at the first difference. |t| > 4.5 would indicate
//! a timing difference at >99.999% confidence.
//!
//! The statistical test is `#[ignore]`d by default: scheduler noise on shared
//! CI runners can push |t| over the threshold. Run it on a quiet machine with
//! `cargo test --release -- --ignored`.

use std::time::Instant;

use portal_crypto_core::compare::constant_time_eq;

/// Number of timing samples per class.
const SAMPLES: usize = 10_000;

/// Welch's t-test threshold.
const T_THRESHOLD: f64 = 4.5;

/// Length of the compared buffers. Long enough that an early exit would
/// dominate the measurement.
const INPUT_LEN: usize = 4096;

#[inline(never)]
fn black_box_compare(a: &[u8], b: &[u8]) -> bool {
    std::hint::black_box(constant_time_eq(std::hint::black_box(a), std::hint::black_box(b)))
}

/// Mean and unbiased variance of one class of timings.
struct Moments {
    n: f64,
    mean: f64,
    variance: f64,
}

impl Moments {
    #[allow(clippy::cast_precision_loss)]
    fn of(samples: &[f64]) -> Option<Self> {
        if samples.len() < 2 {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let squares = samples.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>();
        Some(Self {
            n,
            mean,
            variance: squares / (n - 1.0),
        })
    }

    /// Standard error contribution, `variance / n`.
    fn spread(&self) -> f64 {
        self.variance / self.n
    }
}

/// Welch's t between two timing classes; `NaN` if either has fewer than two
/// samples, `0` if both are constant.
fn welch_t(a: &[f64], b: &[f64]) -> f64 {
    let (Some(a), Some(b)) = (Moments::of(a), Moments::of(b)) else {
        return f64::NAN;
    };
    let stderr = (a.spread() + b.spread()).sqrt();
    if stderr == 0.0 {
        0.0
    } else {
        (a.mean - b.mean) / stderr
    }
}

#[test]
#[ignore = "statistical timing test; run on a quiet machine with --ignored"]
fn constant_time_eq_first_vs_last_byte_mismatch() {
    let reference = vec![0x5Au8; INPUT_LEN];

    let mut first_differs = reference.clone();
    first_differs[0] ^= 0xFF;

    let mut last_differs = reference.clone();
    last_differs[INPUT_LEN - 1] ^= 0xFF;

    for _ in 0..200 {
        black_box_compare(&reference, &first_differs);
        black_box_compare(&reference, &last_differs);
    }

    let mut times_a = Vec::with_capacity(SAMPLES);
    let mut times_b = Vec::with_capacity(SAMPLES);

    for _ in 0..SAMPLES {
        let start = Instant::now();
        let _ = black_box_compare(&reference, &first_differs);
        let elapsed_a = start.elapsed().as_nanos();

        let start = Instant::now();
        let _ = black_box_compare(&reference, &last_differs);
        let elapsed_b = start.elapsed().as_nanos();

        #[allow(clippy::cast_precision_loss)]
        {
            times_a.push(elapsed_a as f64);
            times_b.push(elapsed_b as f64);
        }
    }

    let abs_t = welch_t(&times_a, &times_b).abs();
    eprintln!("constant_time_eq timing: |t| = {abs_t:.2} (threshold {T_THRESHOLD})");

    assert!(
        abs_t < T_THRESHOLD,
        "timing difference detected: |t| = {abs_t:.2}; constant_time_eq may exit early"
    );
}

#[test]
fn mismatch_position_does_not_change_result() {
    let reference = vec![0x11u8; 64];
    for pos in 0..reference.len() {
        let mut other = reference.clone();
        other[pos] ^= 0x01;
        assert!(!constant_time_eq(&reference, &other), "mismatch at {pos} missed");
    }
    assert!(constant_time_eq(&reference, &reference.clone()));
}

#[test]
fn welch_t_is_zero_for_constant_classes() {
    assert_eq!(welch_t(&[3.0; 50], &[3.0; 50]), 0.0);
    assert!(welch_t(&[1.0], &[1.0, 2.0]).is_nan());
}

#[test]
fn welch_t_flags_shifted_class() {
    let fast: Vec<f64> = (0..500).map(|i| 40.0 + f64::from(i % 5)).collect();
    let slow: Vec<f64> = fast.iter().map(|t| t + 25.0).collect();
    assert!(welch_t(&slow, &fast) > 50.0);
}
