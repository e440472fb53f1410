//! Binary-response model building blocks.
//!
//! Links and design construction are small, pure functions so the fitter and
//! the search code stay generic.

pub mod design;
pub mod link;

pub use design::*;
pub use link::*;
