//! Command-line parsing for the rights-issue arbitrage study.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the statistics and search code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::Link;
use crate::fit::DEFAULT_MAX_ITER;
use crate::stats::bootstrap::{DEFAULT_RESAMPLES, DEFAULT_SEED};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "arb", version, about = "Rights-issue arbitrage study")]
pub struct Cli {
    /// Enable debug logging (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Descriptive statistics and tests per partition and subsample.
    Describe(DescribeArgs),
    /// Two-stage logit/probit model search per country and period.
    Predict(PredictArgs),
    /// OLS return regressions per region with Kruskal-Wallis residual tests.
    Regress(RegressArgs),
    /// Write a synthetic dataset in the study CSV layout.
    Simulate(SimulateArgs),
}

/// Dataset location shared by the analysis commands.
#[derive(Debug, Args, Clone)]
pub struct DataArgs {
    /// Study CSV (`;`-delimited). Falls back to `ARB_DATA` from the environment or `.env`.
    #[arg(long, value_name = "CSV")]
    pub data: Option<PathBuf>,

    /// Write all results to a JSON file.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Regions to report (default: AFR AME ASI EUR).
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub regions: Option<Vec<String>>,

    /// Countries to report (default: the 27 study markets).
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub countries: Option<Vec<String>>,

    /// Bootstrap seed.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Bootstrap resamples.
    #[arg(long, default_value_t = DEFAULT_RESAMPLES)]
    pub resamples: usize,
}

#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Countries to search (default: the 27 study markets).
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub countries: Option<Vec<String>>,

    /// Link function(s) to search.
    #[arg(long = "link", value_enum, num_args = 1.., value_delimiter = ',', default_values_t = [Link::Logit, Link::Probit])]
    pub links: Vec<Link>,

    /// IRLS iteration cap per candidate.
    #[arg(long, default_value_t = DEFAULT_MAX_ITER)]
    pub max_iter: usize,

    /// Wall-clock budget per candidate fit, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub fit_timeout_ms: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct RegressArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Regions to regress (default: AFR AME ASI EUR).
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub regions: Option<Vec<String>>,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Output CSV path.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,

    /// Number of rows to generate.
    #[arg(long, default_value_t = 800)]
    pub rows: usize,

    /// Generator seed.
    #[arg(long, default_value_t = 7)]
    pub seed: u64,

    /// Share of rows flagged as outliers.
    #[arg(long, default_value_t = 0.02)]
    pub outlier_rate: f64,
}
