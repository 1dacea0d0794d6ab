//! Latency scaling of per-round rewards.
//!
//! Response times are normalized by `ln(1 + size)`, centered on their mean
//! and pushed through an inverted sigmoid, so quick answers keep close to
//! their full reward and slow ones decay toward zero. The scaled vector is
//! then rescaled so the round pays out exactly the unscaled total.

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::core::types::{
    Uid, SIGMOID_BASE_SHIFT, SIGMOID_BASE_STEEPNESS, SIGMOID_BASE_TIMEOUT,
};

/// Timing facts for one queried provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedResponse {
    pub uid: Uid,
    /// Seconds until the answer arrived; `None` if it never did
    pub response_time: Option<f64>,
    pub data_size: u64,
}

/// `(steepness, shift)` for a round whose time scale is `timeout`
pub fn sigmoid_params(timeout: f64) -> (f64, f64) {
    let ratio = timeout / SIGMOID_BASE_TIMEOUT;
    (SIGMOID_BASE_STEEPNESS / ratio, SIGMOID_BASE_SHIFT * ratio)
}

/// Decreasing sigmoid: small `x` maps near 1, large `x` near 0
pub fn adjusted_sigmoid_inverse(x: f64, steepness: f64, shift: f64) -> f64 {
    1.0 / (1.0 + (steepness * (x - shift)).exp())
}

/// Center `times` on their mean and map them through the inverted sigmoid
pub fn sigmoid_normalize(times: &[f64], timeout: f64) -> Vec<f64> {
    if times.is_empty() {
        return Vec::new();
    }
    let mean = times.iter().sum::<f64>() / times.len() as f64;
    let (steepness, shift) = sigmoid_params(timeout);
    times
        .iter()
        .map(|t| adjusted_sigmoid_inverse(t - mean, steepness, shift))
        .collect()
}

/// `ln(1 + size)`, floored at `ln 2` so empty payloads do not divide by zero
pub fn log_size_factor(data_size: u64) -> f64 {
    (data_size as f64).ln_1p().max(std::f64::consts::LN_2)
}

/// Per-position timing factor; non-responders keep 1.0
pub fn timing_factors(responses: &[TimedResponse]) -> Vec<f64> {
    let normalized: Vec<(usize, f64)> = responses
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.response_time.map(|t| (i, t / log_size_factor(r.data_size))))
        .collect();

    let mut factors = vec![1.0; responses.len()];
    if normalized.is_empty() {
        return factors;
    }

    let times: Vec<f64> = normalized.iter().map(|(_, t)| *t).collect();
    let slowest = times.iter().cloned().fold(f64::MIN, f64::max);
    let timeout = if slowest.is_finite() && slowest > 0.0 {
        slowest * 2.0
    } else {
        SIGMOID_BASE_TIMEOUT
    };
    trace!("size-normalized times: {:?} (timeout {:.4})", times, timeout);

    for ((i, _), factor) in normalized.iter().zip(sigmoid_normalize(&times, timeout)) {
        factors[*i] = factor;
    }
    factors
}

/// Apply timing factors to `base_rewards` and rescale to the same total.
///
/// A round where nobody answered pays nothing. When the scaled total does
/// not share the sign of the base total the rescale would flip every
/// reward, so the base rewards are paid unscaled.
pub fn scale_rewards(responses: &[TimedResponse], base_rewards: &[f64]) -> Vec<f64> {
    debug_assert_eq!(responses.len(), base_rewards.len());

    if responses.iter().all(|r| r.response_time.is_none()) {
        if !responses.is_empty() {
            warn!("No provider answered; zero reward across the board");
        }
        return vec![0.0; base_rewards.len()];
    }

    let factors = timing_factors(responses);
    let time_scaled: Vec<f64> = base_rewards
        .iter()
        .zip(&factors)
        .map(|(reward, factor)| reward * factor)
        .collect();

    let base_sum: f64 = base_rewards.iter().sum();
    let scaled_sum: f64 = time_scaled.iter().sum();
    if !scaled_sum.is_finite() || scaled_sum * base_sum <= 0.0 {
        debug!(
            "Rescale skipped (base {:.6}, scaled {:.6}); paying base rewards",
            base_sum, scaled_sum
        );
        return base_rewards.to_vec();
    }

    let rescale = base_sum / scaled_sum;
    trace!("Rescale factor: {}", rescale);
    time_scaled.into_iter().map(|r| r * rescale).collect()
}
