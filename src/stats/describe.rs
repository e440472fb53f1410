//! Descriptive statistics for one sample slice.

use tracing::debug;

use crate::domain::{SampleSlice, StatsResult};
use crate::math::moments;
use crate::stats::bootstrap::{BootstrapConfig, percentile_t_interval};
use crate::stats::hypothesis::{t_test_p_value, wilcoxon_p_value};

/// Describe the returns and outcome counts of `slice`.
///
/// An empty slice short-circuits to `StatsResult::empty()`. Otherwise missing
/// returns are dropped before any moment or test is computed; statistics that
/// cannot be formed from the remaining values are reported as `None`.
pub fn describe(slice: &SampleSlice<'_>, bootstrap: &BootstrapConfig) -> StatsResult {
    let n = slice.len();
    if n == 0 {
        return StatsResult::empty();
    }

    let arbitrages = slice.iter().filter(|o| o.arbitrage).count();
    let proportion = arbitrages as f64 / n as f64;

    let values = slice.returns();

    let wilcoxon_p = match wilcoxon_p_value(&values) {
        Ok(p) => Some(p),
        Err(e) => {
            debug!(n, "signed-rank test undefined: {e}");
            None
        }
    };
    let interval = percentile_t_interval(&values, n, bootstrap);

    StatsResult {
        n,
        arbitrages: Some(arbitrages),
        proportion: Some(proportion),
        mean: moments::mean(&values),
        std: moments::sample_std(&values),
        median: moments::median(&values),
        max: moments::max(&values),
        min: moments::min(&values),
        skewness: moments::skewness(&values),
        kurtosis: moments::excess_kurtosis(&values),
        t_test_p: t_test_p_value(&values).ok(),
        wilcoxon_p,
        bootstrap_ci_lower: interval.map(|ci| ci.lower),
        bootstrap_ci_upper: interval.map(|ci| ci.upper),
    }
}
