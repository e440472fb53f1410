//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observations and borrowed sample slices (`Observation`, `SampleSlice`)
//! - typed model terms and formulas (`Covariate`, `Term`, `CandidateFormula`)
//! - engine outputs (`StatsResult`, `SuccessRates`)
//! - partitioning and run configuration (`Partition`, `SampleKind`, `StudyConfig`)

pub mod types;

pub use types::*;
