//! Mathematical utilities: moments, ranks, and weighted least squares.

pub mod moments;
pub mod ols;
pub mod ranks;

pub use ols::*;
pub use ranks::*;
