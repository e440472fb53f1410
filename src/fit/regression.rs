//! Fixed-formula return regressions.
//!
//! Within a region, the arbitrage return `ARR` is regressed by OLS on
//! `DIL + IDX + ISC + CAP` with HC1 standard errors. Dropping `DIL` or `IDX`
//! gives two restricted models; the residuals of each are compared with the
//! full model's residuals by a Kruskal-Wallis test.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use tracing::debug;

use crate::domain::{CandidateFormula, Covariate, Observation, SampleSlice, Term};
use crate::fit::fitter::{CoefficientEstimate, FitFailure};
use crate::math::{hc1_standard_errors, numerical_rank, solve_least_squares};
use crate::models::{build_design, design_columns};
use crate::stats::kruskal_wallis;

/// Regressors of the unrestricted return model.
pub const RETURN_COVARIATES: [Covariate; 4] =
    [Covariate::Dil, Covariate::Idx, Covariate::Isc, Covariate::Cap];

/// An OLS fit of `ARR` on a list of covariates.
#[derive(Debug, Clone, Serialize)]
pub struct OlsFit {
    /// Rendered as `ARR ~ DIL + ...`.
    pub formula: String,
    pub n: usize,
    pub estimates: Vec<CoefficientEstimate>,
    pub r_squared: f64,
    /// Residuals aligned with the slice rows.
    #[serde(skip)]
    pub residuals: Vec<f64>,
}

/// The unrestricted model plus the residual comparisons against both
/// restricted models.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnRegression {
    pub full: OlsFit,
    /// Kruskal-Wallis p-value, full vs. model without `DIL`.
    pub kw_dil_p: Option<f64>,
    /// Kruskal-Wallis p-value, full vs. model without `IDX`.
    pub kw_idx_p: Option<f64>,
}

/// Rows usable by the return model: a return and every regressor present.
pub fn has_return_inputs(obs: &Observation) -> bool {
    obs.ret.is_some_and(f64::is_finite)
        && RETURN_COVARIATES.iter().all(|&c| obs.value(c).is_finite())
}

/// OLS of `ARR` on `covariates` (plus an intercept) over `slice`.
pub fn fit_returns_ols(
    covariates: &[Covariate],
    slice: &SampleSlice<'_>,
) -> Result<OlsFit, FitFailure> {
    let formula = CandidateFormula::new(covariates.iter().map(|&c| Term::Main(c)));
    let columns = design_columns(&formula);
    let (n, p) = (slice.len(), columns.len());
    if n == 0 {
        return Err(FitFailure::EmptyDesign);
    }
    if n <= p {
        return Err(FitFailure::Saturated { rows: n, columns: p });
    }

    let x = build_design(&columns, slice);
    for (j, col) in columns.iter().enumerate() {
        if x.column(j).iter().any(|v| !v.is_finite()) {
            return Err(FitFailure::NonFiniteDesign(col.to_string()));
        }
    }
    let y = DVector::from_iterator(n, slice.iter().map(|o| o.ret.unwrap_or(f64::NAN)));
    if y.iter().any(|v| !v.is_finite()) {
        return Err(FitFailure::NonFiniteDesign("ARR".to_string()));
    }

    let rank = numerical_rank(&x);
    if rank < p {
        return Err(FitFailure::Singular { rank, columns: p });
    }
    let beta = solve_least_squares(&x, &y).ok_or(FitFailure::IllConditioned(1))?;
    let residuals: DVector<f64> = &y - &x * &beta;

    let bread = (x.transpose() * &x)
        .try_inverse()
        .ok_or(FitFailure::IllConditioned(1))?;
    let mut scores: DMatrix<f64> = x.clone();
    for i in 0..n {
        scores.row_mut(i).scale_mut(residuals[i]);
    }
    let robust_se = hc1_standard_errors(&bread, &scores);

    let y_mean = y.mean();
    let ss_tot: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let ss_res = residuals.norm_squared();
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    let names: Vec<String> = covariates.iter().map(ToString::to_string).collect();
    Ok(OlsFit {
        formula: format!("ARR ~ {}", names.join(" + ")),
        n,
        estimates: columns
            .iter()
            .zip(beta.iter().zip(&robust_se))
            .map(|(col, (&estimate, &robust_se))| CoefficientEstimate {
                column: col.to_string(),
                estimate,
                robust_se,
            })
            .collect(),
        r_squared,
        residuals: residuals.iter().copied().collect(),
    })
}

/// Fit the unrestricted model and compare it against both restricted ones.
///
/// A restricted model that cannot be fitted, or a test that cannot be formed,
/// leaves its p-value empty instead of failing the region.
pub fn regress_returns(slice: &SampleSlice<'_>) -> Result<ReturnRegression, FitFailure> {
    let full = fit_returns_ols(&RETURN_COVARIATES, slice)?;
    let kw_dil_p = restricted_p_value(&full, Covariate::Dil, slice);
    let kw_idx_p = restricted_p_value(&full, Covariate::Idx, slice);
    Ok(ReturnRegression {
        full,
        kw_dil_p,
        kw_idx_p,
    })
}

fn restricted_p_value(full: &OlsFit, dropped: Covariate, slice: &SampleSlice<'_>) -> Option<f64> {
    let kept: Vec<Covariate> = RETURN_COVARIATES
        .iter()
        .copied()
        .filter(|&c| c != dropped)
        .collect();
    let restricted = match fit_returns_ols(&kept, slice) {
        Ok(fit) => fit,
        Err(e) => {
            debug!(dropped = %dropped, "restricted model failed: {e}");
            return None;
        }
    };
    match kruskal_wallis(&[full.residuals.as_slice(), restricted.residuals.as_slice()]) {
        Ok(kw) => Some(kw.p_value),
        Err(e) => {
            debug!(dropped = %dropped, "Kruskal-Wallis undefined: {e}");
            None
        }
    }
}
