//! Link functions for binary-response models.
//!
//! The fitter relies on two primitive operations per link:
//! - `cdf(η)`: the fitted probability for a linear predictor
//! - `density(η)`: its derivative, used for IRLS weights and scores

use statrs::function::erf::erfc;

use crate::domain::Link;

/// Fitted probability `F(η)`.
pub fn cdf(link: Link, eta: f64) -> f64 {
    match link {
        Link::Logit => {
            // Split by sign so exp never overflows.
            if eta >= 0.0 {
                1.0 / (1.0 + (-eta).exp())
            } else {
                let e = eta.exp();
                e / (1.0 + e)
            }
        }
        Link::Probit => 0.5 * erfc(-eta / std::f64::consts::SQRT_2),
    }
}

/// Density `F'(η)`.
pub fn density(link: Link, eta: f64) -> f64 {
    match link {
        Link::Logit => {
            let p = cdf(Link::Logit, eta);
            p * (1.0 - p)
        }
        Link::Probit => (-0.5 * eta * eta).exp() / (2.0 * std::f64::consts::PI).sqrt(),
    }
}
