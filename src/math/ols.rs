//! Weighted least squares solver.
//!
//! Each IRLS step of the binary-response fitter solves:
//!
//! ```text
//! minimize Σ w_i (z_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - Rows are scaled by `sqrt(w_i)` and the result is solved as ordinary least squares.
//! - SVD is used so tall designs (more rows than columns) are handled directly.
//!   (Nalgebra's `QR::solve` is intended for square systems.)
//! - Rank is checked up front with the same tolerance convention as LAPACK-based
//!   tools: `σ_max * max(n, p) * ε`.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let (n, p) = x.shape();
    let svd = x.clone().svd(true, true);
    let sigma_max = svd.singular_values.max();
    if !(sigma_max.is_finite() && sigma_max > 0.0) {
        return None;
    }
    let tol = sigma_max * n.max(p) as f64 * f64::EPSILON;

    let beta = svd.solve(y, tol).ok()?;
    if beta.iter().all(|v| v.is_finite()) {
        Some(beta)
    } else {
        None
    }
}

/// Solve `Σ w_i (z_i - x_i^T β)^2` by row scaling.
pub fn solve_weighted_least_squares(
    x: &DMatrix<f64>,
    z: &DVector<f64>,
    w: &DVector<f64>,
) -> Option<DVector<f64>> {
    let mut xw = x.clone();
    let mut zw = z.clone();
    for i in 0..x.nrows() {
        let sw = w[i].max(0.0).sqrt();
        xw.row_mut(i).scale_mut(sw);
        zw[i] *= sw;
    }
    solve_least_squares(&xw, &zw)
}

/// HC1 sandwich standard errors.
///
/// `bread` is the inverse information `(X'WX)^-1`; row `i` of `scores` is the
/// score contribution of observation `i`. The covariance is
/// `n / (n - p) · bread · (S'S) · bread`, without the small-sample factor when
/// `n <= p`.
pub fn hc1_standard_errors(bread: &DMatrix<f64>, scores: &DMatrix<f64>) -> Vec<f64> {
    let (n, p) = scores.shape();
    let meat = scores.transpose() * scores;
    let dof_scale = if n > p { n as f64 / (n - p) as f64 } else { 1.0 };
    let cov = (bread * meat * bread) * dof_scale;
    (0..p).map(|j| cov[(j, j)].max(0.0).sqrt()).collect()
}

/// Numerical rank of `x`.
pub fn numerical_rank(x: &DMatrix<f64>) -> usize {
    let (n, p) = x.shape();
    if n == 0 || p == 0 {
        return 0;
    }
    let singular = x.clone().svd(false, false).singular_values;
    let sigma_max = singular.max();
    if !(sigma_max.is_finite() && sigma_max > 0.0) {
        return 0;
    }
    let tol = sigma_max * n.max(p) as f64 * f64::EPSILON;
    singular.iter().filter(|&&s| s > tol).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn zero_weight_rows_are_ignored() {
        // The last row is an outlier with zero weight.
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let z = DVector::from_row_slice(&[1.0, 2.0, 3.0, 100.0]);
        let w = DVector::from_row_slice(&[1.0, 1.0, 1.0, 0.0]);

        let beta = solve_weighted_least_squares(&x, &z, &w).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-10);
        assert!((beta[1] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn rank_detects_duplicated_columns() {
        let x = DMatrix::from_row_slice(3, 3, &[1.0, 2.0, 2.0, 1.0, 3.0, 3.0, 1.0, 5.0, 5.0]);
        assert_eq!(numerical_rank(&x), 2);

        let full = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        assert_eq!(numerical_rank(&full), 2);
    }
}
