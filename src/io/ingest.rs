//! CSV ingest for the rights-issue dataset.
//!
//! The study file is `;`-delimited with one row per rights issue. This module
//! turns it into `Observation`s and nothing more: sample filters, partitions
//! and statistics live elsewhere.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Lenient numbers**: `.` or `,` decimals, blank / `NA` / `nan` as missing

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{info, warn};

use crate::domain::{Covariate, Observation};
use crate::error::AppError;

/// Field delimiter of the study file.
pub const DELIMITER: u8 = b';';

/// Numeric columns that must be present in the header.
const REQUIRED_NUMERIC: [&str; 7] = ["arr", "arb", "out", "dil", "idx", "isc", "cap"];

/// Tag columns that must be present in the header.
const REQUIRED_TAGS: [&str; 3] = ["region", "country", "per"];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: parsed observations plus the rows that were skipped.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub observations: Vec<Observation>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// The standard study filter: non-outliers with non-zero `DIL`, `ISC` and `CAP`.
pub fn study_filter(obs: &Observation) -> bool {
    !obs.outlier
        && obs.value(Covariate::Dil) != 0.0
        && obs.value(Covariate::Isc) != 0.0
        && obs.value(Covariate::Cap) != 0.0
}

/// Load observations from a CSV file.
pub fn load_observations(path: &Path) -> Result<IngestedData, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display()))
    })?;
    let data = load_observations_from_reader(file)?;
    info!(
        path = %path.display(),
        rows = data.rows_read,
        used = data.observations.len(),
        skipped = data.row_errors.len(),
        "loaded dataset"
    );
    Ok(data)
}

/// Load observations from any reader (file, buffer, stdin).
pub fn load_observations_from_reader<R: Read>(source: R) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    ensure_required_columns_exist(&header_map)?;

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Records start after the header line; CSV lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| parse_row(&record, &header_map, line));
        match parsed {
            Ok(obs) => observations.push(obs),
            Err(message) => {
                warn!(line, "skipping row: {message}");
                row_errors.push(RowError { line, message });
            }
        }
    }

    if observations.is_empty() {
        return Err(AppError::new(3, "No valid rows found in the dataset."));
    }

    Ok(IngestedData {
        observations,
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn ensure_required_columns_exist(header_map: &HashMap<String, usize>) -> Result<(), AppError> {
    let missing: Vec<String> = REQUIRED_NUMERIC
        .iter()
        .chain(REQUIRED_TAGS.iter())
        .filter(|name| !header_map.contains_key(**name))
        .map(|name| format!("`{}`", name.to_ascii_uppercase()))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::new(
            2,
            format!("Missing required column(s): {}", missing.join(", ")),
        ))
    }
}

fn parse_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    line: usize,
) -> Result<Observation, String> {
    let ret = parse_number(get_optional(record, header_map, "arr"))
        .map_err(|e| format!("`ARR`: {e}"))?;
    let arbitrage = parse_flag(record, header_map, "arb")?;
    let outlier = parse_flag(record, header_map, "out")?;

    let mut covariates = [f64::NAN; Covariate::COUNT];
    for c in Covariate::ALL {
        let name = c.column().to_ascii_lowercase();
        covariates[c.index()] = parse_number(get_optional(record, header_map, &name))
            .map_err(|e| format!("`{}`: {e}", c.column()))?
            .unwrap_or(f64::NAN);
    }

    Ok(Observation {
        line,
        ret,
        arbitrage,
        outlier,
        covariates,
        region: get_required(record, header_map, "region")?.to_string(),
        country: get_required(record, header_map, "country")?.to_string(),
        period: get_required(record, header_map, "per")?.to_string(),
    })
}

fn parse_flag(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<bool, String> {
    let upper = name.to_ascii_uppercase();
    let raw = get_required(record, header_map, name)?;
    match parse_number(Some(raw)) {
        Ok(Some(v)) if v == 0.0 => Ok(false),
        Ok(Some(v)) if v == 1.0 => Ok(true),
        Ok(Some(v)) => Err(format!("`{upper}` must be 0 or 1, got {v}")),
        Ok(None) => Err(format!("Missing required value: `{upper}`")),
        Err(e) => Err(format!("`{upper}`: {e}")),
    }
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    get_optional(record, header_map, name)
        .ok_or_else(|| format!("Missing required value: `{}`", name.to_ascii_uppercase()))
}

fn get_optional<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a numeric cell. `Ok(None)` means missing.
fn parse_number(s: Option<&str>) -> Result<Option<f64>, String> {
    let Some(s) = s else { return Ok(None) };
    if s.eq_ignore_ascii_case("na") || s.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let v = s
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| format!("invalid number '{s}'"))?;
    Ok(v.is_finite().then_some(v))
}
