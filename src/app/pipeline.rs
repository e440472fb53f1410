//! Shared study pipeline used by the `describe`, `predict` and `regress` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load -> partition -> subsample -> describe / search / regress -> collect rows
//!
//! Cells (partition × subsample × link, or one region) are independent, so each batch runs
//! data-parallel and is collected back in cell order. One failing cell never
//! aborts the batch.

use std::time::Duration;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{Link, Observation, Partition, SampleKind, SampleSlice, StatsResult, StudyConfig};
use crate::error::AppError;
use crate::fit::{
    BinaryFitter, FitOptions, IrlsFitter, ModelSearch, ReturnRegression, SearchOutcome, SearchSpace,
    has_return_inputs, regress_returns,
};
use crate::io::ingest::{IngestedData, load_observations, study_filter};
use crate::stats::{BootstrapConfig, describe};

/// Dataset counts shown in report headers.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub rows_read: usize,
    pub rows_loaded: usize,
    pub rows_skipped: usize,
    /// Rows passing the study filter.
    pub rows_in_study: usize,
}

impl DatasetSummary {
    pub fn from_ingest(ingest: &IngestedData) -> Self {
        Self {
            rows_read: ingest.rows_read,
            rows_loaded: ingest.observations.len(),
            rows_skipped: ingest.row_errors.len(),
            rows_in_study: ingest.observations.iter().filter(|o| study_filter(o)).count(),
        }
    }
}

/// One descriptive cell: a partition and subsample.
#[derive(Debug, Clone, Serialize)]
pub struct DescribeRow {
    pub partition: Partition,
    pub sample: SampleKind,
    /// Outliers in the partition before the study filter.
    pub outliers: usize,
    pub stats: StatsResult,
}

/// Outcome of one predictive cell.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "outcome", rename_all = "snake_case")]
pub enum PredictStatus {
    /// The slice had no rows.
    Empty,
    /// The best model hits nothing overall.
    NoResult,
    Found(SearchOutcome),
    Failed(String),
}

/// One predictive cell: a country, subsample and link.
#[derive(Debug, Clone, Serialize)]
pub struct PredictRow {
    pub country: String,
    pub sample: SampleKind,
    pub link: Link,
    pub n: usize,
    pub status: PredictStatus,
}

/// Outcome of one regional return regression.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "outcome", rename_all = "snake_case")]
pub enum RegressStatus {
    /// No complete rows in the region.
    Empty,
    Fitted(ReturnRegression),
    Failed(String),
}

/// One regression cell: a region.
#[derive(Debug, Clone, Serialize)]
pub struct RegressRow {
    pub region: String,
    pub n: usize,
    pub status: RegressStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct DescribeRun {
    pub dataset: DatasetSummary,
    pub bootstrap_seed: u64,
    pub bootstrap_resamples: usize,
    pub rows: Vec<DescribeRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictRun {
    pub dataset: DatasetSummary,
    pub rows: Vec<PredictRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegressRun {
    pub dataset: DatasetSummary,
    pub rows: Vec<RegressRow>,
}

/// Load the dataset and run the descriptive study.
pub fn run_describe_study(config: &StudyConfig) -> Result<DescribeRun, AppError> {
    let ingest = load_observations(&config.data_path)?;
    let dataset = DatasetSummary::from_ingest(&ingest);
    ensure_study_rows(&dataset)?;

    let bootstrap = BootstrapConfig::default()
        .with_seed(config.bootstrap_seed)
        .with_resamples(config.bootstrap_resamples);
    let rows = run_describe(&ingest.observations, config, &bootstrap);

    Ok(DescribeRun {
        dataset,
        bootstrap_seed: config.bootstrap_seed,
        bootstrap_resamples: config.bootstrap_resamples,
        rows,
    })
}

/// Load the dataset and run the predictive study with the IRLS fitter.
pub fn run_predict_study(config: &StudyConfig) -> Result<PredictRun, AppError> {
    let ingest = load_observations(&config.data_path)?;
    let dataset = DatasetSummary::from_ingest(&ingest);
    ensure_study_rows(&dataset)?;

    let search = ModelSearch::new(IrlsFitter::new(fit_options(config)), SearchSpace::default());
    search.space().validate()?;
    let rows = run_predict(&ingest.observations, config, &search);

    Ok(PredictRun { dataset, rows })
}

/// Load the dataset and run the regional return regressions.
pub fn run_regress_study(config: &StudyConfig) -> Result<RegressRun, AppError> {
    let ingest = load_observations(&config.data_path)?;
    let dataset = DatasetSummary::from_ingest(&ingest);
    ensure_study_rows(&dataset)?;

    let rows = run_regress(&ingest.observations, config);
    Ok(RegressRun { dataset, rows })
}

/// Fitter options derived from the run configuration.
pub fn fit_options(config: &StudyConfig) -> FitOptions {
    FitOptions {
        max_iter: config.max_iter,
        time_budget: config.fit_timeout_ms.map(Duration::from_millis),
        ..FitOptions::default()
    }
}

/// `Total`, then each region, then each country.
pub fn partitions(config: &StudyConfig) -> Vec<Partition> {
    std::iter::once(Partition::Total)
        .chain(config.regions.iter().cloned().map(Partition::Region))
        .chain(config.countries.iter().cloned().map(Partition::Country))
        .collect()
}

/// Descriptive statistics for every partition × subsample.
///
/// `observations` is the full loaded dataset; the study filter is applied here
/// after counting each partition's outliers.
pub fn run_describe(
    observations: &[Observation],
    config: &StudyConfig,
    bootstrap: &BootstrapConfig,
) -> Vec<DescribeRow> {
    let all = SampleSlice::from_observations(observations);
    let cells: Vec<(Partition, SampleKind)> = partitions(config)
        .into_iter()
        .flat_map(|p| SampleKind::DESCRIBE.into_iter().map(move |k| (p.clone(), k)))
        .collect();

    cells
        .into_par_iter()
        .map(|(partition, sample)| {
            let part = all.filter(|o| partition.matches(o));
            let outliers = part.iter().filter(|o| o.outlier).count();
            let slice = part.filter(|o| study_filter(o) && sample.matches(o));
            let stats = describe(&slice, bootstrap);
            if sample == SampleKind::Full {
                info!(partition = partition.label(), n = stats.n, "described partition");
            }
            DescribeRow {
                partition,
                sample,
                outliers,
                stats,
            }
        })
        .collect()
}

/// Model search for every country × subsample × link.
pub fn run_predict<F: BinaryFitter>(
    observations: &[Observation],
    config: &StudyConfig,
    search: &ModelSearch<F>,
) -> Vec<PredictRow> {
    let study = SampleSlice::from_observations(observations).filter(study_filter);
    let mut cells: Vec<(String, SampleKind, Link)> = Vec::new();
    for country in &config.countries {
        for sample in SampleKind::PREDICT {
            for &link in &config.links {
                cells.push((country.clone(), sample, link));
            }
        }
    }

    cells
        .into_par_iter()
        .map(|(country, sample, link)| {
            let slice = study.filter(|o| o.country == country && sample.matches(o));
            let n = slice.len();
            let status = predict_cell(search, &slice, link, &country, sample);
            PredictRow {
                country,
                sample,
                link,
                n,
                status,
            }
        })
        .collect()
}

/// Return regression for every configured region.
///
/// Rows must pass the study filter and carry a return and every regressor.
pub fn run_regress(observations: &[Observation], config: &StudyConfig) -> Vec<RegressRow> {
    let usable = SampleSlice::from_observations(observations)
        .filter(|o| study_filter(o) && has_return_inputs(o));

    config
        .regions
        .par_iter()
        .map(|region| {
            let slice = usable.filter(|o| o.region == *region);
            let n = slice.len();
            let status = if slice.is_empty() {
                RegressStatus::Empty
            } else {
                match regress_returns(&slice) {
                    Ok(fit) => {
                        info!(region = region.as_str(), n, "return model fitted");
                        RegressStatus::Fitted(fit)
                    }
                    Err(e) => {
                        warn!(region = region.as_str(), n, "return model failed: {e}");
                        RegressStatus::Failed(e.to_string())
                    }
                }
            };
            RegressRow {
                region: region.clone(),
                n,
                status,
            }
        })
        .collect()
}

fn predict_cell<F: BinaryFitter>(
    search: &ModelSearch<F>,
    slice: &SampleSlice<'_>,
    link: Link,
    country: &str,
    sample: SampleKind,
) -> PredictStatus {
    if slice.is_empty() {
        return PredictStatus::Empty;
    }
    match search.search_best_model(slice, link) {
        Ok(outcome) if outcome.rates.overall == 0.0 => PredictStatus::NoResult,
        Ok(outcome) => {
            info!(
                country,
                sample = %sample.label(),
                link = link.label(),
                formula = %outcome.formula,
                "model selected"
            );
            PredictStatus::Found(outcome)
        }
        Err(e) => {
            warn!(country, sample = %sample.label(), link = link.label(), "search failed: {e}");
            PredictStatus::Failed(e.to_string())
        }
    }
}

fn ensure_study_rows(dataset: &DatasetSummary) -> Result<(), AppError> {
    if dataset.rows_in_study == 0 {
        return Err(AppError::new(
            3,
            "No rows remain after the study filter (OUT = 0, DIL/ISC/CAP != 0).",
        ));
    }
    Ok(())
}
