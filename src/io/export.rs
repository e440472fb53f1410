//! Result and dataset exports.
//!
//! - JSON report of a whole run, easy to consume in notebooks or scripts
//! - `;`-delimited observation CSV in the same layout the loader reads

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::{Covariate, Observation};
use crate::error::AppError;
use crate::io::ingest::DELIMITER;

/// Write any serializable report as pretty JSON.
pub fn write_report_json<T: Serialize>(path: &Path, report: &T) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create export JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| AppError::new(2, format!("Failed to write export JSON: {e}")))
}

/// Write observations to a CSV file.
pub fn write_observations_csv(path: &Path, observations: &[Observation]) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create CSV '{}': {e}", path.display()))
    })?;
    write_observations(file, observations)
}

/// Write observations to any writer.
pub fn write_observations<W: Write>(sink: W, observations: &[Observation]) -> Result<(), AppError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_writer(sink);
    let map_err = |e: csv::Error| AppError::new(2, format!("Failed to write CSV: {e}"));

    let mut header: Vec<&str> = vec!["ARR", "ARB", "OUT"];
    header.extend(Covariate::ALL.iter().map(|c| c.column()));
    header.extend(["Region", "Country", "PER"]);
    writer.write_record(&header).map_err(map_err)?;

    for obs in observations {
        let mut record: Vec<String> = Vec::with_capacity(header.len());
        record.push(obs.ret.map(format_number).unwrap_or_default());
        record.push(flag(obs.arbitrage));
        record.push(flag(obs.outlier));
        record.extend(obs.covariates.iter().map(|&v| format_number(v)));
        record.push(obs.region.clone());
        record.push(obs.country.clone());
        record.push(obs.period.clone());
        writer.write_record(&record).map_err(map_err)?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush CSV: {e}")))
}

fn flag(v: bool) -> String {
    if v { "1" } else { "0" }.to_string()
}

fn format_number(v: f64) -> String {
    if v.is_finite() {
        v.to_string()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ingest::load_observations_from_reader;

    #[test]
    fn written_csv_loads_back() {
        let mut covariates = [0.0; Covariate::COUNT];
        covariates[Covariate::Dil.index()] = 0.25;
        covariates[Covariate::Tec.index()] = 1.0;
        covariates[Covariate::Cap.index()] = f64::NAN;
        let obs = Observation {
            line: 2,
            ret: None,
            arbitrage: true,
            outlier: false,
            covariates,
            region: "AME".to_string(),
            country: "BRA".to_string(),
            period: "PER3".to_string(),
        };

        let mut buf = Vec::new();
        write_observations(&mut buf, std::slice::from_ref(&obs)).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("ARR;ARB;OUT;DIL;IDX"));

        let back = load_observations_from_reader(text.as_bytes()).unwrap();
        let loaded = &back.observations[0];
        assert_eq!(loaded.ret, None);
        assert!(loaded.arbitrage);
        assert_eq!(loaded.value(Covariate::Dil), 0.25);
        assert_eq!(loaded.value(Covariate::Tec), 1.0);
        assert!(loaded.value(Covariate::Cap).is_nan());
        assert_eq!(loaded.country, "BRA");
    }
}
