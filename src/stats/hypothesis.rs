//! Location tests against zero.
//!
//! - one-sample Student t-test (two-sided)
//! - Wilcoxon signed-rank test (two-sided), exact for small untied samples and
//!   normal-approximated otherwise

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use thiserror::Error;

use crate::math::average_ranks;
use crate::math::moments::{mean, sample_std};

/// Largest sample for which the exact signed-rank distribution is used.
const EXACT_MAX_N: usize = 50;

/// A test whose statistic cannot be formed from the given values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TestDegeneracy {
    #[error("need at least {needed} values, got {got}")]
    TooFewValues { needed: usize, got: usize },
    #[error("all differences are zero")]
    AllZero,
    #[error("statistic has zero variance")]
    ZeroVariance,
    #[error("distribution error: {0}")]
    Distribution(String),
}

/// Two-sided p-value of `H0: mean = 0`.
pub fn t_test_p_value(values: &[f64]) -> Result<f64, TestDegeneracy> {
    let n = values.len();
    if n < 2 {
        return Err(TestDegeneracy::TooFewValues { needed: 2, got: n });
    }
    let m = mean(values).ok_or(TestDegeneracy::TooFewValues { needed: 2, got: n })?;
    let s = sample_std(values).ok_or(TestDegeneracy::TooFewValues { needed: 2, got: n })?;
    let se = s / (n as f64).sqrt();

    if se == 0.0 {
        // Constant sample: the statistic is ±inf unless the mean is exactly zero.
        return if m == 0.0 {
            Err(TestDegeneracy::ZeroVariance)
        } else {
            Ok(0.0)
        };
    }

    let t = m / se;
    let dist = StudentsT::new(0.0, 1.0, n as f64 - 1.0)
        .map_err(|e| TestDegeneracy::Distribution(e.to_string()))?;
    Ok((2.0 * dist.sf(t.abs())).min(1.0))
}

/// Two-sided p-value of the signed-rank test of `values` against zero.
///
/// Zero differences are discarded before ranking.
pub fn wilcoxon_p_value(values: &[f64]) -> Result<f64, TestDegeneracy> {
    let d: Vec<f64> = values.iter().copied().filter(|v| *v != 0.0).collect();
    if d.is_empty() {
        return Err(TestDegeneracy::AllZero);
    }
    let had_zeros = d.len() != values.len();

    let abs: Vec<f64> = d.iter().map(|v| v.abs()).collect();
    let (ranks, ties) = average_ranks(&abs);
    let r_plus: f64 = d
        .iter()
        .zip(&ranks)
        .filter(|(v, _)| **v > 0.0)
        .map(|(_, r)| *r)
        .sum();

    let n = d.len();
    if n <= EXACT_MAX_N && ties.is_empty() && !had_zeros {
        return Ok(exact_two_sided(n, r_plus.round() as usize));
    }

    normal_two_sided(n, r_plus, &ties)
}

fn exact_two_sided(n: usize, r_plus: usize) -> f64 {
    let counts = signed_rank_counts(n);
    let total = 2f64.powi(n as i32);
    let le: f64 = counts[..=r_plus].iter().sum::<f64>() / total;
    let ge: f64 = counts[r_plus..].iter().sum::<f64>() / total;
    (2.0 * le.min(ge)).min(1.0)
}

/// Number of subsets of `{1..n}` for each possible rank sum.
fn signed_rank_counts(n: usize) -> Vec<f64> {
    let max_sum = n * (n + 1) / 2;
    let mut counts = vec![0.0; max_sum + 1];
    counts[0] = 1.0;
    for k in 1..=n {
        for s in (k..=max_sum).rev() {
            counts[s] += counts[s - k];
        }
    }
    counts
}

fn normal_two_sided(n: usize, r_plus: f64, ties: &[usize]) -> Result<f64, TestDegeneracy> {
    let n_f = n as f64;
    let total = n_f * (n_f + 1.0) / 2.0;
    let r_minus = total - r_plus;
    let t = r_plus.min(r_minus);

    let mean = n_f * (n_f + 1.0) / 4.0;
    let tie_adj: f64 = ties
        .iter()
        .map(|&t| {
            let t = t as f64;
            t * t * t - t
        })
        .sum::<f64>()
        / 48.0;
    let var = n_f * (n_f + 1.0) * (2.0 * n_f + 1.0) / 24.0 - tie_adj;
    if !(var > 0.0) {
        return Err(TestDegeneracy::ZeroVariance);
    }

    let z = (t - mean) / var.sqrt();
    let normal =
        Normal::new(0.0, 1.0).map_err(|e| TestDegeneracy::Distribution(e.to_string()))?;
    Ok((2.0 * normal.sf(z.abs())).min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_test_reference_value() {
        // mean 2.5, sd 1.29099, n 4 => t = 3.873, df 3, p ≈ 0.030466.
        let p = t_test_p_value(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!((p - 0.030466).abs() < 1e-5, "got {p}");
    }

    #[test]
    fn t_test_is_symmetric_in_sign() {
        let a = t_test_p_value(&[0.1, -0.3, 0.5, 0.2]).unwrap();
        let b = t_test_p_value(&[-0.1, 0.3, -0.5, -0.2]).unwrap();
        assert!((a - b).abs() < 1e-15);
    }

    #[test]
    fn t_test_degenerate_inputs() {
        assert!(matches!(
            t_test_p_value(&[1.0]),
            Err(TestDegeneracy::TooFewValues { .. })
        ));
        assert_eq!(t_test_p_value(&[0.0, 0.0, 0.0]), Err(TestDegeneracy::ZeroVariance));
        assert_eq!(t_test_p_value(&[2.0, 2.0]), Ok(0.0));
    }

    #[test]
    fn wilcoxon_exact_small_sample() {
        // All five differences positive: P(W+ >= 15) = 1/32, two-sided 1/16.
        let p = wilcoxon_p_value(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert!((p - 0.0625).abs() < 1e-12, "got {p}");

        // Perfectly balanced signs give p = 1.
        let p = wilcoxon_p_value(&[1.0, -2.0, -3.0, 4.0]).unwrap();
        assert!((p - 1.0).abs() < 1e-12, "got {p}");
    }

    #[test]
    fn signed_rank_counts_sum_to_power_of_two() {
        for n in [1usize, 5, 12, 30] {
            let total: f64 = signed_rank_counts(n).iter().sum();
            assert_eq!(total, 2f64.powi(n as i32));
        }
    }

    #[test]
    fn wilcoxon_ties_use_corrected_normal_variance() {
        // |d| ranks 2,2,2,4.5,4.5,6 => T = 2, mean 10.5, var 22.75 - 30/48 = 22.125.
        let p = wilcoxon_p_value(&[1.0, 1.0, 2.0, 2.0, 3.0, -1.0]).unwrap();
        assert!((p - 0.070750).abs() < 1e-6, "got {p}");
    }

    #[test]
    fn wilcoxon_drops_zeros_before_ranking() {
        // Ranks of [1,2,3,4] with the 4 negative: T = 4, mean 5, var 7.5.
        let p = wilcoxon_p_value(&[0.0, 1.0, 2.0, 3.0, -4.0]).unwrap();
        assert!((p - 0.715001).abs() < 1e-5, "got {p}");
    }

    #[test]
    fn wilcoxon_large_samples_use_normal_approximation() {
        // n = 60, all positive: T = 0, mean 915, var 18452.5.
        let values: Vec<f64> = (1..=60).map(|i| i as f64).collect();
        let p = wilcoxon_p_value(&values).unwrap();
        assert!((p - 1.63e-11).abs() < 0.01e-11, "got {p}");
    }

    #[test]
    fn wilcoxon_degenerate_inputs_are_reported() {
        assert_eq!(wilcoxon_p_value(&[0.0, 0.0]), Err(TestDegeneracy::AllZero));
        assert_eq!(wilcoxon_p_value(&[]), Err(TestDegeneracy::AllZero));
    }
}
