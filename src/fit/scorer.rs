//! Asymmetric hit-rate scoring of fitted probabilities.
//!
//! A prediction counts as a hit when it lands clearly on the correct side:
//! - outcome 0 and `p <= LOW`
//! - outcome 1 and `p >= UP`
//!
//! Probabilities in `(LOW, UP)` are "undecided" and never hit.

use std::fmt;

use thiserror::Error;

use crate::domain::SuccessRates;

/// Lower probability threshold.
pub const LOW: f64 = 1.0 / 3.0;

/// Upper probability threshold (`1 - LOW`).
pub const UP: f64 = 1.0 - LOW;

/// One side of the binary outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeClass {
    Positive,
    Negative,
}

impl fmt::Display for OutcomeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeClass::Positive => f.write_str("positive"),
            OutcomeClass::Negative => f.write_str("negative"),
        }
    }
}

/// What to report when a class has no observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyClassPolicy {
    /// Return `ScoreError::EmptyClass`.
    #[default]
    Fail,
    /// Report the rate of the empty class as 0.
    Zero,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreError {
    #[error("outcome and probability lengths differ ({outcomes} vs {probabilities})")]
    LengthMismatch { outcomes: usize, probabilities: usize },
    #[error("no {0} outcomes to score")]
    EmptyClass(OutcomeClass),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SuccessScorer {
    policy: EmptyClassPolicy,
}

impl SuccessScorer {
    pub fn new(policy: EmptyClassPolicy) -> Self {
        Self { policy }
    }

    /// Score `probabilities` against `outcomes` (same order, same length).
    pub fn score(&self, outcomes: &[bool], probabilities: &[f64]) -> Result<SuccessRates, ScoreError> {
        if outcomes.len() != probabilities.len() {
            return Err(ScoreError::LengthMismatch {
                outcomes: outcomes.len(),
                probabilities: probabilities.len(),
            });
        }

        let mut pos = 0usize;
        let mut neg = 0usize;
        let mut pos_hits = 0usize;
        let mut neg_hits = 0usize;
        for (&y, &p) in outcomes.iter().zip(probabilities) {
            if y {
                pos += 1;
                if p >= UP {
                    pos_hits += 1;
                }
            } else {
                neg += 1;
                if p <= LOW {
                    neg_hits += 1;
                }
            }
        }

        let positive = self.rate(pos_hits, pos, OutcomeClass::Positive)?;
        let negative = self.rate(neg_hits, neg, OutcomeClass::Negative)?;
        let overall = if pos + neg == 0 {
            0.0
        } else {
            (pos_hits + neg_hits) as f64 / (pos + neg) as f64
        };

        Ok(SuccessRates {
            overall,
            positive,
            negative,
        })
    }

    fn rate(&self, hits: usize, total: usize, class: OutcomeClass) -> Result<f64, ScoreError> {
        if total > 0 {
            return Ok(hits as f64 / total as f64);
        }
        match self.policy {
            EmptyClassPolicy::Fail => Err(ScoreError::EmptyClass(class)),
            EmptyClassPolicy::Zero => Ok(0.0),
        }
    }
}
