//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - report and dataset exports (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
