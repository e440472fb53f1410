//! Model fitting and selection.
//!
//! Responsibilities:
//!
//! - fit logit / probit candidates (IRLS with robust errors)
//! - score fitted probabilities with the asymmetric hit-rate rule
//! - enumerate and select candidate formulas in two stages
//! - regress returns on the fixed return model (OLS with HC1 errors)

pub mod fitter;
pub mod regression;
pub mod scorer;
pub mod search;
pub mod subsets;

pub use fitter::*;
pub use regression::*;
pub use scorer::*;
pub use search::*;
pub use subsets::*;
