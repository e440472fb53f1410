//! Sample moments and order statistics.
//!
//! Conventions follow the usual data-frame defaults so published tables can be
//! reproduced:
//! - standard deviation uses the `n - 1` denominator
//! - skewness is the bias-adjusted Fisher–Pearson coefficient (G1)
//! - kurtosis is the bias-adjusted excess kurtosis (G2, normal ⇒ 0)
//! - percentiles interpolate linearly between order statistics

/// Central moment sums below this are treated as exact zeros.
const FP_ZERO: f64 = 1e-14;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (`n - 1` denominator). Needs two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (values.len() as f64 - 1.0)).sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted_copy(values);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

/// Bias-adjusted sample skewness. Needs three values; 0 for constant input.
pub fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let m = mean(values)?;
    let (m2, m3) = values.iter().fold((0.0, 0.0), |(s2, s3), v| {
        let d = v - m;
        (s2 + d * d, s3 + d * d * d)
    });
    let m2 = zero_out(m2);
    let m3 = zero_out(m3);
    if m2 == 0.0 {
        return Some(0.0);
    }
    let n = n as f64;
    Some(n * (n - 1.0).sqrt() / (n - 2.0) * (m3 / m2.powf(1.5)))
}

/// Bias-adjusted excess kurtosis. Needs four values; 0 for constant input.
pub fn excess_kurtosis(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 4 {
        return None;
    }
    let m = mean(values)?;
    let (m2, m4) = values.iter().fold((0.0, 0.0), |(s2, s4), v| {
        let d2 = (v - m) * (v - m);
        (s2 + d2, s4 + d2 * d2)
    });
    let m2 = zero_out(m2);
    let m4 = zero_out(m4);

    let n = n as f64;
    let adj = 3.0 * (n - 1.0).powi(2) / ((n - 2.0) * (n - 3.0));
    let numer = n * (n + 1.0) * (n - 1.0) * m4;
    let denom = (n - 2.0) * (n - 3.0) * m2 * m2;
    if denom == 0.0 {
        return Some(0.0);
    }
    Some(numer / denom - adj)
}

/// Percentile `q ∈ [0, 100]` of an ascending-sorted slice, linear interpolation.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=100.0).contains(&q) {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * q / 100.0;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = h - lo as f64;
    if frac == 0.0 {
        return Some(sorted[lo]);
    }
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Ascending copy using a total order (NaN sorts last).
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

fn zero_out(v: f64) -> f64 {
    if v.abs() < FP_ZERO { 0.0 } else { v }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_moments() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(mean(&v), Some(2.5));
        assert!((sample_std(&v).unwrap() - 1.2909944487358056).abs() < 1e-12);
        assert_eq!(median(&v), Some(2.5));
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(max(&v), Some(4.0));
        assert_eq!(min(&v), Some(1.0));
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn skewness_matches_reference_values() {
        // Reference: adjusted Fisher-Pearson skewness of [1, 2, 3, 10].
        let v = [1.0, 2.0, 3.0, 10.0];
        let s = skewness(&v).unwrap();
        assert!((s - 1.763632614803888).abs() < 1e-10, "got {s}");

        let symmetric = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(skewness(&symmetric).unwrap().abs() < 1e-12);
        assert_eq!(skewness(&[2.0, 2.0, 2.0]), Some(0.0));
        assert_eq!(skewness(&[1.0, 2.0]), None);
    }

    #[test]
    fn kurtosis_matches_reference_values() {
        // Reference: bias-adjusted excess kurtosis of [1, 2, 3, 4, 5] is -1.2.
        let k = excess_kurtosis(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert!((k + 1.2).abs() < 1e-12, "got {k}");

        let k = excess_kurtosis(&[1.0, 2.0, 3.0, 10.0]).unwrap();
        assert!((k - 3.228).abs() < 1e-10, "got {k}");

        assert_eq!(excess_kurtosis(&[1.0, 1.0, 1.0, 1.0]), Some(0.0));
        assert_eq!(excess_kurtosis(&[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&sorted, 0.0), Some(1.0));
        assert_eq!(percentile_sorted(&sorted, 100.0), Some(5.0));
        assert_eq!(percentile_sorted(&sorted, 50.0), Some(3.0));
        let p = percentile_sorted(&sorted, 2.5).unwrap();
        assert!((p - 1.1).abs() < 1e-12);
        let p = percentile_sorted(&sorted, 97.5).unwrap();
        assert!((p - 4.9).abs() < 1e-12);
        assert_eq!(percentile_sorted(&[], 50.0), None);
    }
}
