//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - resolves the dataset path (flag, then `ARB_DATA` from the environment / `.env`)
//! - runs the descriptive, predictive or return-regression study
//! - prints reports
//! - writes optional exports

use std::path::PathBuf;

use clap::Parser;

use crate::cli::{Command, DataArgs, DescribeArgs, PredictArgs, RegressArgs, SimulateArgs};
use crate::data::{SampleConfig, generate_sample};
use crate::domain::{StudyConfig, default_countries, default_regions};
use crate::error::AppError;
use crate::stats::bootstrap::{DEFAULT_RESAMPLES, DEFAULT_SEED};

pub mod pipeline;

/// Environment variable naming the default dataset.
pub const DATA_ENV_VAR: &str = "ARB_DATA";

/// Entry point for the `arb` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    crate::logging::init_logging(cli.verbose);

    match cli.command {
        Command::Describe(args) => handle_describe(args),
        Command::Predict(args) => handle_predict(args),
        Command::Regress(args) => handle_regress(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn handle_describe(args: DescribeArgs) -> Result<(), AppError> {
    let config = describe_config_from_args(&args)?;
    let run = pipeline::run_describe_study(&config)?;
    print!("{}", crate::report::format_describe_run(&run));

    if let Some(path) = &config.export {
        crate::io::export::write_report_json(path, &run)?;
    }
    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let config = predict_config_from_args(&args)?;
    let run = pipeline::run_predict_study(&config)?;
    print!("{}", crate::report::format_predict_run(&run));

    if let Some(path) = &config.export {
        crate::io::export::write_report_json(path, &run)?;
    }
    Ok(())
}

fn handle_regress(args: RegressArgs) -> Result<(), AppError> {
    let config = regress_config_from_args(&args)?;
    let run = pipeline::run_regress_study(&config)?;
    print!("{}", crate::report::format_regress_run(&run));

    if let Some(path) = &config.export {
        crate::io::export::write_report_json(path, &run)?;
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = SampleConfig {
        rows: args.rows,
        seed: args.seed,
        outlier_rate: args.outlier_rate,
    };
    let observations = generate_sample(&config)?;
    crate::io::export::write_observations_csv(&args.out, &observations)?;
    println!(
        "Wrote {} synthetic observations to {}",
        observations.len(),
        args.out.display()
    );
    Ok(())
}

pub fn describe_config_from_args(args: &DescribeArgs) -> Result<StudyConfig, AppError> {
    if args.resamples == 0 {
        return Err(AppError::new(2, "Bootstrap resamples must be > 0."));
    }
    Ok(StudyConfig {
        data_path: resolve_data_path(&args.data)?,
        regions: codes_or(args.regions.as_deref(), default_regions),
        countries: codes_or(args.countries.as_deref(), default_countries),
        bootstrap_seed: args.seed,
        bootstrap_resamples: args.resamples,
        links: Vec::new(),
        max_iter: crate::fit::DEFAULT_MAX_ITER,
        fit_timeout_ms: None,
        export: args.data.export.clone(),
    })
}

pub fn predict_config_from_args(args: &PredictArgs) -> Result<StudyConfig, AppError> {
    if args.max_iter == 0 {
        return Err(AppError::new(2, "Iteration cap must be > 0."));
    }
    if args.links.is_empty() {
        return Err(AppError::new(2, "At least one link is required."));
    }
    let mut links = Vec::with_capacity(args.links.len());
    for &link in &args.links {
        if !links.contains(&link) {
            links.push(link);
        }
    }
    Ok(StudyConfig {
        data_path: resolve_data_path(&args.data)?,
        regions: default_regions(),
        countries: codes_or(args.countries.as_deref(), default_countries),
        bootstrap_seed: DEFAULT_SEED,
        bootstrap_resamples: DEFAULT_RESAMPLES,
        links,
        max_iter: args.max_iter,
        fit_timeout_ms: args.fit_timeout_ms,
        export: args.data.export.clone(),
    })
}

pub fn regress_config_from_args(args: &RegressArgs) -> Result<StudyConfig, AppError> {
    Ok(StudyConfig {
        data_path: resolve_data_path(&args.data)?,
        regions: codes_or(args.regions.as_deref(), default_regions),
        countries: Vec::new(),
        bootstrap_seed: DEFAULT_SEED,
        bootstrap_resamples: DEFAULT_RESAMPLES,
        links: Vec::new(),
        max_iter: crate::fit::DEFAULT_MAX_ITER,
        fit_timeout_ms: None,
        export: args.data.export.clone(),
    })
}

/// `--data`, else `ARB_DATA` (a `.env` file is loaded first).
fn resolve_data_path(args: &DataArgs) -> Result<PathBuf, AppError> {
    if let Some(path) = &args.data {
        return Ok(path.clone());
    }
    dotenvy::dotenv().ok();
    std::env::var_os(DATA_ENV_VAR)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| {
            AppError::new(
                2,
                format!("No dataset given: pass --data or set {DATA_ENV_VAR} (environment or .env)."),
            )
        })
}

/// Trimmed, upper-cased codes, or the defaults when none were given.
fn codes_or(codes: Option<&[String]>, default: fn() -> Vec<String>) -> Vec<String> {
    match codes {
        Some(list) if !list.is_empty() => list
            .iter()
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty())
            .collect(),
        _ => default(),
    }
}
