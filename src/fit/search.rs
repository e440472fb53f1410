//! Two-stage combinatorial model search.
//!
//! Stage 1 enumerates every non-empty subset of the base terms and keeps the
//! candidate with the highest positive hit rate. Stage 2 appends every
//! non-empty subset of the interaction terms to that winner and selects again.
//!
//! Candidates of one stage are fitted in parallel but collected in enumeration
//! order, and the winner is picked by a sequential scan that only replaces the
//! incumbent on a strictly greater positive rate. The first maximal candidate
//! therefore wins regardless of thread count.

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::{CandidateFormula, Covariate, Link, SampleSlice, SuccessRates, Term};
use crate::fit::fitter::{BinaryFitter, CoefficientEstimate};
use crate::fit::scorer::{EmptyClassPolicy, SuccessScorer};
use crate::fit::subsets::{MAX_TERMS, non_empty_subsets};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("stage {stage} has no terms to search")]
    EmptyStage { stage: u8 },
    #[error("stage {stage} has {terms} terms (at most {limit} are searchable)", limit = MAX_TERMS)]
    TooManyTerms { stage: u8, terms: usize },
}

/// Terms searched by each stage.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpace {
    pub base_terms: Vec<Term>,
    pub interaction_terms: Vec<Term>,
}

impl Default for SearchSpace {
    /// Eight base covariates, then `DIL * sector` for every sector.
    fn default() -> Self {
        Self {
            base_terms: Covariate::BASE.iter().map(|&c| Term::Main(c)).collect(),
            interaction_terms: Covariate::SECTORS
                .iter()
                .map(|&s| Term::Interaction(Covariate::Dil, s))
                .collect(),
        }
    }
}

impl SearchSpace {
    pub fn validate(&self) -> Result<(), SearchError> {
        for (stage, terms) in [(1u8, &self.base_terms), (2u8, &self.interaction_terms)] {
            if terms.is_empty() {
                return Err(SearchError::EmptyStage { stage });
            }
            if terms.len() > MAX_TERMS {
                return Err(SearchError::TooManyTerms {
                    stage,
                    terms: terms.len(),
                });
            }
        }
        Ok(())
    }
}

/// Score of one fitted candidate.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore {
    pub formula: CandidateFormula,
    pub pseudo_r2: f64,
    pub rates: SuccessRates,
    /// Why the fit failed, if it did. Failed candidates score 0 everywhere.
    pub failure: Option<String>,
    /// Empty for failed candidates.
    pub estimates: Vec<CoefficientEstimate>,
    pub log_likelihood: Option<f64>,
}

impl CandidateScore {
    fn failed(formula: CandidateFormula, reason: String) -> Self {
        Self {
            formula,
            pseudo_r2: 0.0,
            rates: SuccessRates::default(),
            failure: Some(reason),
            estimates: Vec::new(),
            log_likelihood: None,
        }
    }
}

/// Result of a full two-stage search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub link: Link,
    pub formula: CandidateFormula,
    pub pseudo_r2: f64,
    pub rates: SuccessRates,
    /// Coefficients of the selected model; empty when every candidate failed.
    pub estimates: Vec<CoefficientEstimate>,
    pub log_likelihood: Option<f64>,
    pub stage1_formula: CandidateFormula,
    pub stage1_positive_rate: f64,
    /// Candidates evaluated over both stages.
    pub candidates: usize,
    pub fit_failures: usize,
}

/// `1 - SSres / SStot` of fitted probabilities against 0/1 outcomes.
///
/// Returns 0 when the outcomes have no variance.
pub fn pseudo_r_squared(outcomes: &[bool], fitted: &[f64]) -> f64 {
    let n = outcomes.len();
    if n == 0 || fitted.len() != n {
        return 0.0;
    }
    let ys: Vec<f64> = outcomes.iter().map(|&y| if y { 1.0 } else { 0.0 }).collect();
    let mean = ys.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = ys.iter().map(|y| (y - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    let ss_res: f64 = ys.iter().zip(fitted).map(|(y, p)| (y - p).powi(2)).sum();
    1.0 - ss_res / ss_tot
}

/// Search engine over a fixed `SearchSpace`.
pub struct ModelSearch<F: BinaryFitter> {
    fitter: F,
    space: SearchSpace,
    scorer: SuccessScorer,
}

impl<F: BinaryFitter> ModelSearch<F> {
    pub fn new(fitter: F, space: SearchSpace) -> Self {
        Self {
            fitter,
            space,
            scorer: SuccessScorer::new(EmptyClassPolicy::Zero),
        }
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    /// Run both stages on `slice` with `link`.
    pub fn search_best_model(
        &self,
        slice: &SampleSlice<'_>,
        link: Link,
    ) -> Result<SearchOutcome, SearchError> {
        self.space.validate()?;
        let outcomes = slice.outcomes();

        let stage1: Vec<CandidateFormula> = non_empty_subsets(self.space.base_terms.len())
            .into_iter()
            .map(|idx| CandidateFormula::new(idx.into_iter().map(|i| self.space.base_terms[i])))
            .collect();
        let scores1 = self.evaluate(stage1, slice, &outcomes, link);
        let best1 = select_best(&scores1);
        let stage1_formula = scores1[best1].formula.clone();
        let stage1_positive_rate = scores1[best1].rates.positive;
        debug!(
            link = link.label(),
            candidates = scores1.len(),
            best = %stage1_formula,
            positive = stage1_positive_rate,
            "stage 1 complete"
        );

        let stage2: Vec<CandidateFormula> = non_empty_subsets(self.space.interaction_terms.len())
            .into_iter()
            .map(|idx| {
                stage1_formula.extended(idx.into_iter().map(|i| self.space.interaction_terms[i]))
            })
            .collect();
        let scores2 = self.evaluate(stage2, slice, &outcomes, link);
        let best2 = select_best(&scores2);

        let fit_failures = scores1
            .iter()
            .chain(&scores2)
            .filter(|s| s.failure.is_some())
            .count();
        let winner = &scores2[best2];
        debug!(
            link = link.label(),
            candidates = scores2.len(),
            best = %winner.formula,
            positive = winner.rates.positive,
            fit_failures,
            "stage 2 complete"
        );

        Ok(SearchOutcome {
            link,
            formula: winner.formula.clone(),
            pseudo_r2: winner.pseudo_r2,
            rates: winner.rates,
            estimates: winner.estimates.clone(),
            log_likelihood: winner.log_likelihood,
            stage1_formula,
            stage1_positive_rate,
            candidates: scores1.len() + scores2.len(),
            fit_failures,
        })
    }

    /// Fit and score all formulas; output order equals input order.
    fn evaluate(
        &self,
        formulas: Vec<CandidateFormula>,
        slice: &SampleSlice<'_>,
        outcomes: &[bool],
        link: Link,
    ) -> Vec<CandidateScore> {
        formulas
            .into_par_iter()
            .map(|formula| self.score_candidate(formula, slice, outcomes, link))
            .collect()
    }

    fn score_candidate(
        &self,
        formula: CandidateFormula,
        slice: &SampleSlice<'_>,
        outcomes: &[bool],
        link: Link,
    ) -> CandidateScore {
        let fit = match self.fitter.fit(&formula, slice, link) {
            Ok(fit) => fit,
            Err(e) => {
                debug!(formula = %formula, "candidate fit failed: {e}");
                return CandidateScore::failed(formula, e.to_string());
            }
        };
        match self.scorer.score(outcomes, &fit.fitted) {
            Ok(rates) => CandidateScore {
                pseudo_r2: pseudo_r_squared(outcomes, &fit.fitted),
                formula,
                rates,
                failure: None,
                estimates: fit.estimates(),
                log_likelihood: Some(fit.log_likelihood),
            },
            Err(e) => {
                debug!(formula = %formula, "candidate could not be scored: {e}");
                CandidateScore::failed(formula, e.to_string())
            }
        }
    }
}

/// Index of the first candidate with the maximal positive rate.
fn select_best(scores: &[CandidateScore]) -> usize {
    let mut best = 0;
    for (i, s) in scores.iter().enumerate().skip(1) {
        if s.rates.positive > scores[best].rates.positive {
            best = i;
        }
    }
    best
}
