//! Percentile-t (bootstrap-t) confidence interval for the mean.
//!
//! For each resample the studentized mean `t* = mean* / (std* / √N)` is
//! collected. With `q_lo`, `q_hi` the lower/upper percentiles of `t*`:
//!
//! ```text
//! lower = mean - q_hi * std / √n
//! upper = mean - q_lo * std / √n
//! ```
//!
//! The upper pivot percentile sets the lower bound and vice versa.
//!
//! Reproducibility: the generator is seeded once per call from the config and
//! resample indices are drawn sequentially from that single stream, one batch
//! of resamples at a time. Pivots of a batch are evaluated in parallel and
//! appended in resample order, so neither the batch size nor the thread count
//! changes the result.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::math::moments::{mean, percentile_sorted, sample_std, sorted_copy};

/// Seed used by the published study tables.
pub const DEFAULT_SEED: u64 = 42;

/// Number of resamples used by the published study tables.
pub const DEFAULT_RESAMPLES: usize = 999;

/// Resamples whose indices are held in memory at once.
const RESAMPLES_PER_BATCH: usize = 64;

/// Configuration for bootstrap resampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Number of bootstrap resamples.
    pub resamples: usize,
    /// Confidence level for the interval (e.g., 0.95 for 95% CI).
    pub confidence: f64,
    /// Seed for the per-call generator.
    pub seed: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            resamples: DEFAULT_RESAMPLES,
            confidence: 0.95,
            seed: DEFAULT_SEED,
        }
    }
}

impl BootstrapConfig {
    /// Sets the generator seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the number of resamples.
    #[must_use]
    pub fn with_resamples(mut self, resamples: usize) -> Self {
        self.resamples = resamples;
        self
    }
}

/// A bootstrap-t interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileTInterval {
    pub lower: f64,
    pub upper: f64,
}

/// Compute the percentile-t interval for the mean of `values`.
///
/// `resample_len` is the size of each resample (the row count of the sample the
/// values were taken from). Returns `None` when the interval is undefined:
/// no values, fewer than two values, zero resamples, or non-finite pivots
/// (e.g. resamples with zero spread).
pub fn percentile_t_interval(
    values: &[f64],
    resample_len: usize,
    config: &BootstrapConfig,
) -> Option<PercentileTInterval> {
    if values.len() < 2 || resample_len < 2 || config.resamples == 0 {
        return None;
    }
    if !(config.confidence > 0.0 && config.confidence < 1.0) {
        return None;
    }

    let m = mean(values)?;
    let s = sample_std(values)?;

    let pivots = resample_pivots(values, resample_len, config, RESAMPLES_PER_BATCH);
    if pivots.iter().any(|t| t.is_nan()) {
        return None;
    }
    let sorted = sorted_copy(&pivots);

    let alpha = (1.0 - config.confidence) / 2.0;
    let q_lo = percentile_sorted(&sorted, alpha * 100.0)?;
    let q_hi = percentile_sorted(&sorted, (1.0 - alpha) * 100.0)?;

    let se = s / (values.len() as f64).sqrt();
    let lower = m - q_hi * se;
    let upper = m - q_lo * se;
    if !(lower.is_finite() && upper.is_finite()) {
        return None;
    }

    Some(PercentileTInterval { lower, upper })
}

/// Studentized means of every resample, in resample order.
///
/// Indices come from one seeded stream, resample after resample; only `batch`
/// resamples are materialized at a time.
fn resample_pivots(
    values: &[f64],
    resample_len: usize,
    config: &BootstrapConfig,
    batch: usize,
) -> Vec<f64> {
    let batch = batch.max(1);
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut pivots = Vec::with_capacity(config.resamples);
    let mut indices = Vec::with_capacity(batch.min(config.resamples) * resample_len);

    let mut remaining = config.resamples;
    while remaining > 0 {
        let take = remaining.min(batch);
        indices.clear();
        indices.extend((0..take * resample_len).map(|_| rng.gen_range(0..values.len())));

        pivots.par_extend(indices.par_chunks(resample_len).map(|chunk| {
            let sample: Vec<f64> = chunk.iter().map(|&i| values[i]).collect();
            studentized_mean(&sample)
        }));
        remaining -= take;
    }
    pivots
}

fn studentized_mean(sample: &[f64]) -> f64 {
    let (Some(m), Some(s)) = (mean(sample), sample_std(sample)) else {
        return f64::NAN;
    };
    m / (s / (sample.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<f64> {
        vec![
            0.021, -0.004, 0.035, 0.012, -0.018, 0.044, 0.007, 0.015, -0.009, 0.028, 0.003,
            0.019, -0.012, 0.031, 0.010,
        ]
    }

    #[test]
    fn interval_is_deterministic_for_fixed_seed() {
        let v = sample();
        let config = BootstrapConfig::default();
        let a = percentile_t_interval(&v, v.len(), &config).unwrap();
        let b = percentile_t_interval(&v, v.len(), &config).unwrap();
        assert_eq!(a.lower.to_bits(), b.lower.to_bits());
        assert_eq!(a.upper.to_bits(), b.upper.to_bits());
    }

    #[test]
    fn interval_is_ordered() {
        let v = sample();
        let ci = percentile_t_interval(&v, v.len(), &BootstrapConfig::default()).unwrap();
        assert!(ci.lower <= ci.upper, "{ci:?}");

        let mirrored: Vec<f64> = v.iter().map(|x| -x).collect();
        let ci = percentile_t_interval(&mirrored, v.len(), &BootstrapConfig::default()).unwrap();
        assert!(ci.lower <= ci.upper, "{ci:?}");
    }

    #[test]
    fn different_seeds_change_the_interval() {
        let v = sample();
        let a = percentile_t_interval(&v, v.len(), &BootstrapConfig::default()).unwrap();
        let b = percentile_t_interval(&v, v.len(), &BootstrapConfig::default().with_seed(7))
            .unwrap();
        assert!(a != b);
    }

    #[test]
    fn pivots_do_not_depend_on_batch_size() {
        let v = sample();
        let config = BootstrapConfig::default().with_resamples(150);
        let one = resample_pivots(&v, v.len(), &config, 1);
        let batched = resample_pivots(&v, v.len(), &config, RESAMPLES_PER_BATCH);
        let whole = resample_pivots(&v, v.len(), &config, 150);
        let bits = |p: &[f64]| p.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(one.len(), 150);
        assert_eq!(bits(&one), bits(&batched));
        assert_eq!(bits(&one), bits(&whole));
    }

    #[test]
    fn pivot_stream_is_sequential_across_resamples() {
        // Drawing 2 resamples must reproduce the prefix of drawing 3.
        let v = sample();
        let config = BootstrapConfig::default().with_resamples(2);
        let short = resample_pivots(&v, 4, &config, 1);
        let long = resample_pivots(&v, 4, &config.clone().with_resamples(3), 2);
        assert_eq!(short[0].to_bits(), long[0].to_bits());
        assert_eq!(short[1].to_bits(), long[1].to_bits());
    }

    #[test]
    fn undefined_for_tiny_or_constant_samples() {
        let config = BootstrapConfig::default();
        assert!(percentile_t_interval(&[], 0, &config).is_none());
        assert!(percentile_t_interval(&[1.0], 1, &config).is_none());
        // Constant values give 0/0 pivots.
        assert!(percentile_t_interval(&[0.5, 0.5, 0.5], 3, &config).is_none());
    }
}
