//! Binary-response fitting service.
//!
//! Given a candidate formula, a sample slice and a link, we:
//! - build the design matrix from the formula's columns
//! - estimate β by iteratively reweighted least squares (Fisher scoring)
//! - report fitted probabilities and heteroskedasticity-robust (HC1) standard errors
//!
//! Every way a candidate can be ill-posed is a typed `FitFailure`, so the search
//! can score it and move on.

use std::time::{Duration, Instant};

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

use crate::domain::{CandidateFormula, Link, SampleSlice};
use crate::math::{hc1_standard_errors, numerical_rank, solve_weighted_least_squares};
use crate::models::{DesignColumn, build_design, cdf, density, design_columns};

/// Iteration cap used by common discrete-choice fitters.
pub const DEFAULT_MAX_ITER: usize = 35;

/// Relative deviance change that counts as converged.
pub const DEFAULT_TOLERANCE: f64 = 1e-8;

/// Fitted probabilities are kept this far from 0 and 1 inside the iteration.
const PROB_EPS: f64 = 1e-12;

/// Floor for the link density when forming working responses.
const MIN_DENSITY: f64 = 1e-150;

/// Absolute distance at which fitted probabilities "equal" the outcome.
const PERFECT_PRED_ATOL: f64 = 1e-8;

/// Why a candidate could not be fitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitFailure {
    #[error("design has no rows")]
    EmptyDesign,
    #[error("column {0} contains non-finite values")]
    NonFiniteDesign(String),
    #[error("design is rank deficient (rank {rank} < {columns} columns)")]
    Singular { rank: usize, columns: usize },
    #[error("design is saturated ({rows} rows for {columns} columns)")]
    Saturated { rows: usize, columns: usize },
    #[error("weighted least squares step failed at iteration {0}")]
    IllConditioned(usize),
    #[error("perfect separation: fitted probabilities reproduce the outcome")]
    PerfectSeparation,
    #[error("no convergence after {0} iterations")]
    NonConvergence(usize),
    #[error("fit exceeded its budget of {0:?}")]
    Timeout(Duration),
}

/// Options that affect how each candidate is estimated.
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub max_iter: usize,
    pub tolerance: f64,
    /// Optional wall-clock budget per candidate.
    ///
    /// Off by default: a budget makes results depend on machine speed.
    pub time_budget: Option<Duration>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iter: DEFAULT_MAX_ITER,
            tolerance: DEFAULT_TOLERANCE,
            time_budget: None,
        }
    }
}

/// A successful binary-response fit.
#[derive(Debug, Clone)]
pub struct BinaryFit {
    pub link: Link,
    pub columns: Vec<DesignColumn>,
    pub coefficients: Vec<f64>,
    /// HC1 robust standard errors, aligned with `columns`.
    pub robust_se: Vec<f64>,
    /// Fitted probabilities, aligned with the slice rows.
    pub fitted: Vec<f64>,
    pub log_likelihood: f64,
    pub iterations: usize,
}

impl BinaryFit {
    /// Coefficients paired with their column names and robust standard errors.
    pub fn estimates(&self) -> Vec<CoefficientEstimate> {
        self.columns
            .iter()
            .zip(self.coefficients.iter().zip(&self.robust_se))
            .map(|(col, (&estimate, &robust_se))| CoefficientEstimate {
                column: col.to_string(),
                estimate,
                robust_se,
            })
            .collect()
    }
}

/// One estimated coefficient with its HC1 standard error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientEstimate {
    pub column: String,
    pub estimate: f64,
    pub robust_se: f64,
}

impl CoefficientEstimate {
    pub fn z_score(&self) -> Option<f64> {
        (self.robust_se > 0.0 && self.robust_se.is_finite()).then(|| self.estimate / self.robust_se)
    }

    /// Two-sided normal p-value of a zero coefficient.
    pub fn p_value(&self) -> Option<f64> {
        let z = self.z_score()?;
        let normal = Normal::new(0.0, 1.0).ok()?;
        Some((2.0 * normal.sf(z.abs())).min(1.0))
    }
}

/// The fitting service seen by the model search.
pub trait BinaryFitter: Sync {
    fn fit(
        &self,
        formula: &CandidateFormula,
        slice: &SampleSlice<'_>,
        link: Link,
    ) -> Result<BinaryFit, FitFailure>;
}

/// Logit/probit estimation by IRLS.
#[derive(Debug, Clone, Default)]
pub struct IrlsFitter {
    options: FitOptions,
}

impl IrlsFitter {
    pub fn new(options: FitOptions) -> Self {
        Self { options }
    }
}

impl BinaryFitter for IrlsFitter {
    fn fit(
        &self,
        formula: &CandidateFormula,
        slice: &SampleSlice<'_>,
        link: Link,
    ) -> Result<BinaryFit, FitFailure> {
        let columns = design_columns(formula);
        let x = build_design(&columns, slice);

        for (j, col) in columns.iter().enumerate() {
            if x.column(j).iter().any(|v| !v.is_finite()) {
                return Err(FitFailure::NonFiniteDesign(col.to_string()));
            }
        }

        let y = DVector::from_iterator(
            slice.len(),
            slice.iter().map(|o| if o.arbitrage { 1.0 } else { 0.0 }),
        );

        let estimate = irls(&x, &y, link, &self.options)?;
        Ok(BinaryFit {
            link,
            columns,
            coefficients: estimate.beta.iter().copied().collect(),
            robust_se: estimate.robust_se,
            fitted: estimate.fitted,
            log_likelihood: estimate.log_likelihood,
            iterations: estimate.iterations,
        })
    }
}

struct Estimate {
    beta: DVector<f64>,
    robust_se: Vec<f64>,
    fitted: Vec<f64>,
    log_likelihood: f64,
    iterations: usize,
}

fn irls(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    link: Link,
    opts: &FitOptions,
) -> Result<Estimate, FitFailure> {
    let (n, p) = x.shape();
    if n == 0 {
        return Err(FitFailure::EmptyDesign);
    }
    let rank = numerical_rank(x);
    if rank < p {
        return Err(FitFailure::Singular { rank, columns: p });
    }

    let started = Instant::now();
    let mut beta = DVector::<f64>::zeros(p);
    let mut dev = deviance(x, y, &beta, link);

    for iter in 1..=opts.max_iter {
        if let Some(budget) = opts.time_budget {
            if started.elapsed() >= budget {
                return Err(FitFailure::Timeout(budget));
            }
        }

        // Working weights and response for one Fisher-scoring step.
        let eta = x * &beta;
        let mut w = DVector::<f64>::zeros(n);
        let mut z = DVector::<f64>::zeros(n);
        for i in 0..n {
            let mu = clamp_prob(cdf(link, eta[i]));
            let f = density(link, eta[i]).max(MIN_DENSITY);
            w[i] = f * f / (mu * (1.0 - mu));
            z[i] = eta[i] + (y[i] - mu) / f;
        }

        let next = solve_weighted_least_squares(x, &z, &w)
            .ok_or(FitFailure::IllConditioned(iter))?;
        let next_dev = deviance(x, y, &next, link);
        if !next_dev.is_finite() {
            return Err(FitFailure::IllConditioned(iter));
        }
        beta = next;

        if predicts_perfectly(x, y, &beta, link) {
            return Err(FitFailure::PerfectSeparation);
        }

        let change = (dev - next_dev).abs() / (next_dev.abs() + 0.1);
        dev = next_dev;
        if change < opts.tolerance {
            return finish(x, y, beta, link, iter);
        }
    }

    Err(FitFailure::NonConvergence(opts.max_iter))
}

fn finish(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    beta: DVector<f64>,
    link: Link,
    iterations: usize,
) -> Result<Estimate, FitFailure> {
    let n = x.nrows();
    let eta = x * &beta;

    let fitted: Vec<f64> = eta.iter().map(|&e| cdf(link, e)).collect();

    // Bread: expected information X'WX. Meat: outer products of per-row scores.
    let mut xw = x.clone();
    let mut scores = x.clone();
    for i in 0..n {
        let mu = clamp_prob(fitted[i]);
        let f = density(link, eta[i]).max(MIN_DENSITY);
        let v = mu * (1.0 - mu);
        xw.row_mut(i).scale_mut((f * f / v).sqrt());
        scores.row_mut(i).scale_mut((y[i] - mu) * f / v);
    }
    let information = xw.transpose() * &xw;
    let bread = information
        .try_inverse()
        .ok_or(FitFailure::IllConditioned(iterations))?;
    let robust_se = hc1_standard_errors(&bread, &scores);

    Ok(Estimate {
        log_likelihood: log_likelihood(y, &eta, link),
        beta,
        robust_se,
        fitted,
        iterations,
    })
}

fn clamp_prob(p: f64) -> f64 {
    p.clamp(PROB_EPS, 1.0 - PROB_EPS)
}

fn log_likelihood(y: &DVector<f64>, eta: &DVector<f64>, link: Link) -> f64 {
    y.iter()
        .zip(eta.iter())
        .map(|(&yi, &e)| {
            let mu = clamp_prob(cdf(link, e));
            yi * mu.ln() + (1.0 - yi) * (1.0 - mu).ln()
        })
        .sum()
}

fn deviance(x: &DMatrix<f64>, y: &DVector<f64>, beta: &DVector<f64>, link: Link) -> f64 {
    let eta = x * beta;
    -2.0 * log_likelihood(y, &eta, link)
}

fn predicts_perfectly(x: &DMatrix<f64>, y: &DVector<f64>, beta: &DVector<f64>, link: Link) -> bool {
    let eta = x * beta;
    eta.iter()
        .zip(y.iter())
        .all(|(&e, &yi)| (cdf(link, e) - yi).abs() <= PERFECT_PRED_ATOL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Covariate, Observation, Term};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn obs(dil: f64, idx: f64, arbitrage: bool) -> Observation {
        let mut covariates = [0.0; Covariate::COUNT];
        covariates[Covariate::Dil.index()] = dil;
        covariates[Covariate::Idx.index()] = idx;
        Observation {
            line: 0,
            ret: Some(0.0),
            arbitrage,
            outlier: false,
            covariates,
            region: "AME".to_string(),
            country: "USA".to_string(),
            period: "PER1".to_string(),
        }
    }

    fn simulate(link: Link, b0: f64, b1: f64, n: usize, seed: u64) -> Vec<Observation> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let x = rng.gen_range(-2.0..2.0);
                let p = cdf(link, b0 + b1 * x);
                let u: f64 = rng.gen_range(0.0..1.0);
                obs(x, 0.0, u < p)
            })
            .collect()
    }

    fn dil_only() -> CandidateFormula {
        CandidateFormula::new([Term::Main(Covariate::Dil)])
    }

    #[test]
    fn logit_recovers_known_coefficients() {
        let data = simulate(Link::Logit, -0.5, 1.5, 4000, 11);
        let slice = SampleSlice::from_observations(&data);
        let fit = IrlsFitter::default().fit(&dil_only(), &slice, Link::Logit).unwrap();

        assert_eq!(fit.columns.len(), 2);
        assert!((fit.coefficients[0] + 0.5).abs() < 0.2, "{:?}", fit.coefficients);
        assert!((fit.coefficients[1] - 1.5).abs() < 0.25, "{:?}", fit.coefficients);
        assert!(fit.robust_se.iter().all(|s| s.is_finite() && *s > 0.0));
        assert_eq!(fit.fitted.len(), data.len());
        assert!(fit.fitted.iter().all(|p| *p > 0.0 && *p < 1.0));
        assert!(fit.log_likelihood < 0.0);
    }

    #[test]
    fn probit_recovers_known_coefficients() {
        let data = simulate(Link::Probit, 0.3, -1.0, 4000, 5);
        let slice = SampleSlice::from_observations(&data);
        let fit = IrlsFitter::default().fit(&dil_only(), &slice, Link::Probit).unwrap();

        assert!((fit.coefficients[0] - 0.3).abs() < 0.15, "{:?}", fit.coefficients);
        assert!((fit.coefficients[1] + 1.0).abs() < 0.15, "{:?}", fit.coefficients);
        assert!(fit.iterations <= DEFAULT_MAX_ITER);
    }

    #[test]
    fn separated_data_is_reported_for_both_links() {
        let data: Vec<Observation> = [-2.0, -1.5, -1.0, 1.0, 1.5, 2.0]
            .iter()
            .map(|&x| obs(x, 0.0, x > 0.0))
            .collect();
        let slice = SampleSlice::from_observations(&data);
        for link in [Link::Logit, Link::Probit] {
            let err = IrlsFitter::default()
                .fit(&dil_only(), &slice, link)
                .unwrap_err();
            assert_eq!(err, FitFailure::PerfectSeparation, "{link:?}");
        }
    }

    #[test]
    fn coefficient_p_value_is_two_sided_normal() {
        let est = CoefficientEstimate {
            column: "DIL".to_string(),
            estimate: -0.41,
            robust_se: 0.2,
        };
        assert!((est.z_score().unwrap() + 2.05).abs() < 1e-12);
        assert!((est.p_value().unwrap() - 0.040364).abs() < 1e-6);

        let degenerate = CoefficientEstimate { robust_se: 0.0, ..est };
        assert_eq!(degenerate.p_value(), None);
    }

    #[test]
    fn collinear_design_is_singular() {
        let data: Vec<Observation> = (0..20)
            .map(|i| {
                let x = i as f64 / 10.0;
                obs(x, x, i % 3 == 0)
            })
            .collect();
        let slice = SampleSlice::from_observations(&data);
        let formula = CandidateFormula::new([Term::Main(Covariate::Dil), Term::Main(Covariate::Idx)]);
        let err = IrlsFitter::default()
            .fit(&formula, &slice, Link::Probit)
            .unwrap_err();
        assert_eq!(err, FitFailure::Singular { rank: 2, columns: 3 });
    }

    #[test]
    fn missing_covariate_is_reported() {
        let mut data = simulate(Link::Logit, 0.0, 1.0, 50, 3);
        data[7].covariates[Covariate::Dil.index()] = f64::NAN;
        let slice = SampleSlice::from_observations(&data);
        let err = IrlsFitter::default()
            .fit(&dil_only(), &slice, Link::Logit)
            .unwrap_err();
        assert_eq!(err, FitFailure::NonFiniteDesign("DIL".to_string()));
    }

    #[test]
    fn iteration_cap_and_budget_are_enforced() {
        let data = simulate(Link::Logit, -0.5, 1.5, 300, 9);
        let slice = SampleSlice::from_observations(&data);

        let capped = IrlsFitter::new(FitOptions {
            max_iter: 1,
            ..FitOptions::default()
        });
        assert_eq!(
            capped.fit(&dil_only(), &slice, Link::Logit).unwrap_err(),
            FitFailure::NonConvergence(1)
        );

        let budgeted = IrlsFitter::new(FitOptions {
            time_budget: Some(Duration::ZERO),
            ..FitOptions::default()
        });
        assert_eq!(
            budgeted.fit(&dil_only(), &slice, Link::Logit).unwrap_err(),
            FitFailure::Timeout(Duration::ZERO)
        );
    }

    #[test]
    fn empty_slice_is_rejected() {
        let err = IrlsFitter::default()
            .fit(&dil_only(), &SampleSlice::default(), Link::Logit)
            .unwrap_err();
        assert_eq!(err, FitFailure::EmptyDesign);
    }
}
