//! Kruskal-Wallis H test on two or more independent samples.
//!
//! Values are ranked jointly (ties share their average rank) and
//!
//! ```text
//! H = 12 / (N (N + 1)) · Σ R_i² / n_i - 3 (N + 1)
//! ```
//!
//! is divided by the tie correction `1 - Σ (t³ - t) / (N³ - N)`. The p-value is
//! the upper tail of a chi-square with `k - 1` degrees of freedom.

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::math::average_ranks;
use crate::stats::hypothesis::TestDegeneracy;

/// Result of a Kruskal-Wallis test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KruskalWallis {
    pub statistic: f64,
    pub p_value: f64,
}

pub fn kruskal_wallis(groups: &[&[f64]]) -> Result<KruskalWallis, TestDegeneracy> {
    if groups.len() < 2 {
        return Err(TestDegeneracy::TooFewValues {
            needed: 2,
            got: groups.len(),
        });
    }
    if groups.iter().any(|g| g.is_empty()) {
        return Err(TestDegeneracy::TooFewValues { needed: 1, got: 0 });
    }

    let pooled: Vec<f64> = groups.iter().flat_map(|g| g.iter().copied()).collect();
    let (ranks, ties) = average_ranks(&pooled);
    let n = pooled.len() as f64;

    let tie_sum: f64 = ties
        .iter()
        .map(|&t| {
            let t = t as f64;
            t * t * t - t
        })
        .sum();
    let correction = 1.0 - tie_sum / (n * n * n - n);
    if !(correction > 0.0) {
        return Err(TestDegeneracy::ZeroVariance);
    }

    let mut start = 0;
    let mut between = 0.0;
    for g in groups {
        let rank_sum: f64 = ranks[start..start + g.len()].iter().sum();
        between += rank_sum * rank_sum / g.len() as f64;
        start += g.len();
    }
    let statistic = (12.0 / (n * (n + 1.0)) * between - 3.0 * (n + 1.0)) / correction;

    let dist = ChiSquared::new((groups.len() - 1) as f64)
        .map_err(|e| TestDegeneracy::Distribution(e.to_string()))?;
    Ok(KruskalWallis {
        statistic,
        p_value: dist.sf(statistic).clamp(0.0, 1.0),
    })
}
