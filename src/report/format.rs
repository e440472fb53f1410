//! Formatted terminal output for study runs.
//!
//! We keep formatting code in one place so:
//! - the statistics and search code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::app::pipeline::{
    DatasetSummary, DescribeRow, DescribeRun, PredictRow, PredictRun, PredictStatus, RegressRow,
    RegressRun, RegressStatus,
};
use crate::domain::SampleKind;
use crate::fit::CoefficientEstimate;

const RULE: &str = "====================";

/// Dataset header shared by both commands.
pub fn format_dataset_summary(dataset: &DatasetSummary) -> String {
    format!(
        "Rows: read={} | loaded={} | skipped={} | in study={}\n",
        dataset.rows_read, dataset.rows_loaded, dataset.rows_skipped, dataset.rows_in_study
    )
}

/// One descriptive block. The full sample also shows outliers and shape statistics.
pub fn format_describe_row(row: &DescribeRow) -> String {
    let s = &row.stats;
    let full = row.sample == SampleKind::Full;
    let mut out = String::new();

    out.push_str(&format!(
        "{RULE} {} - {} {RULE}\n",
        row.partition.label(),
        row.sample.label()
    ));
    out.push_str(&format!(
        "N: {} / ARB: {} ({})",
        s.n,
        s.arbitrages.map(|a| a.to_string()).unwrap_or_else(na),
        pct(s.proportion)
    ));
    if full {
        out.push_str(&format!("  - Outliers: {}", row.outliers));
    }
    out.push('\n');
    out.push_str(&format!(
        "Average: {} ({}) - t: {} ({}, {})\n",
        pct(s.mean),
        pct(s.std),
        num(s.t_test_p, 4),
        num(s.bootstrap_ci_lower, 4),
        num(s.bootstrap_ci_upper, 4)
    ));
    out.push_str(&format!(
        "Median: {} - W: {}\n",
        pct(s.median),
        num(s.wilcoxon_p, 4)
    ));
    if full {
        out.push_str(&format!(
            "Maximum: {} - Minimum: {} - Skewness: {} - Kurtosis: {}\n",
            pct(s.max),
            pct(s.min),
            num(s.skewness, 2),
            num(s.kurtosis, 2)
        ));
    }
    out
}

pub fn format_describe_run(run: &DescribeRun) -> String {
    let mut out = String::new();
    out.push_str("=== arb - Descriptive statistics ===\n");
    out.push_str(&format_dataset_summary(&run.dataset));
    out.push_str(&format!(
        "Bootstrap: percentile-t, {} resamples, seed {}\n\n",
        run.bootstrap_resamples, run.bootstrap_seed
    ));
    for row in &run.rows {
        out.push_str(&format_describe_row(row));
        out.push('\n');
    }
    out
}

/// One predictive block.
pub fn format_predict_row(row: &PredictRow) -> String {
    let mut out = String::new();
    match &row.status {
        PredictStatus::Empty => {
            out.push_str(&format!(
                "{RULE} Results for {} - Period: {} {RULE}\n",
                row.country,
                row.sample.label()
            ));
            out.push_str("No Results available.\n");
        }
        status => {
            out.push_str(&format!(
                "{RULE} Results for {} - Model: {} - Period: {} {RULE}\n",
                row.country,
                row.link.label(),
                row.sample.label()
            ));
            match status {
                PredictStatus::Found(o) => {
                    out.push_str(&format!(
                        "Formula (R2: {}): {}\n",
                        pct(Some(o.pseudo_r2)),
                        o.formula
                    ));
                    out.push_str(&format!(
                        "Success: ARB: {} - nARB: {} - Total: {}\n",
                        pct(Some(o.rates.positive)),
                        pct(Some(o.rates.negative)),
                        pct(Some(o.rates.overall))
                    ));
                    if !o.estimates.is_empty() {
                        out.push_str(&format_estimates(&o.estimates));
                    }
                }
                PredictStatus::Failed(reason) => {
                    out.push_str(&format!("Search failed: {reason}\n"));
                }
                _ => out.push_str("No Results available.\n"),
            }
        }
    }
    out
}

/// All predictive blocks, then a compact table of the selected models.
///
/// An empty slice is reported once per country and period, not once per link.
pub fn format_predict_run(run: &PredictRun) -> String {
    let mut out = String::new();
    out.push_str("=== arb - Two-stage model search ===\n");
    out.push_str(&format_dataset_summary(&run.dataset));
    out.push('\n');

    let mut last_empty: Option<(&str, SampleKind)> = None;
    for row in &run.rows {
        if matches!(row.status, PredictStatus::Empty) {
            let key = (row.country.as_str(), row.sample);
            if last_empty == Some(key) {
                continue;
            }
            last_empty = Some(key);
        }
        out.push_str(&format_predict_row(row));
        out.push('\n');
    }

    out.push_str(&format_predict_table(&run.rows));
    out
}

fn format_predict_table(rows: &[PredictRow]) -> String {
    let mut out = String::new();
    out.push_str("Selected models:\n");
    out.push_str(
        format!(
            "{:<8} {:<12} {:<5} {:>6} {:>8} {:>8} {:>8} {:>8}",
            "country", "period", "link", "n", "R2", "ARB", "nARB", "total"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&format!(
        "{:-<8} {:-<12} {:-<5} {:-<6} {:-<8} {:-<8} {:-<8} {:-<8}\n",
        "", "", "", "", "", "", "", ""
    ));
    for row in rows {
        let PredictStatus::Found(o) = &row.status else {
            continue;
        };
        out.push_str(&format!(
            "{:<8} {:<12} {:<5} {:>6} {:>8} {:>8} {:>8} {:>8}\n",
            row.country,
            row.sample.label(),
            row.link.label(),
            row.n,
            pct(Some(o.pseudo_r2)),
            pct(Some(o.rates.positive)),
            pct(Some(o.rates.negative)),
            pct(Some(o.rates.overall))
        ));
    }
    out
}

/// One regional return regression.
pub fn format_regress_row(row: &RegressRow) -> String {
    let mut out = format!("{RULE} OLS Estimation for: {} {RULE}\n", row.region);
    match &row.status {
        RegressStatus::Empty => out.push_str("No Results available.\n"),
        RegressStatus::Failed(reason) => out.push_str(&format!("Regression failed: {reason}\n")),
        RegressStatus::Fitted(fit) => {
            out.push_str(&format!(
                "{} (N: {}, R2: {})\n",
                fit.full.formula,
                fit.full.n,
                pct(Some(fit.full.r_squared))
            ));
            out.push_str(&format_estimates(&fit.full.estimates));
            out.push_str(&format!("KW Test for DIL: {}\n", num(fit.kw_dil_p, 4)));
            out.push_str(&format!("KW Test for IDX: {}\n", num(fit.kw_idx_p, 4)));
        }
    }
    out
}

pub fn format_regress_run(run: &RegressRun) -> String {
    let mut out = String::new();
    out.push_str("=== arb - Return regressions ===\n");
    out.push_str(&format_dataset_summary(&run.dataset));
    out.push('\n');
    for row in &run.rows {
        out.push_str(&format_regress_row(row));
        out.push('\n');
    }
    out
}

/// Coefficient table with HC1 standard errors and normal p-values.
fn format_estimates(estimates: &[CoefficientEstimate]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<12} {:>10} {:>10} {:>8} {:>8}\n",
        "", "coef", "HC1 se", "z", "P>|z|"
    ));
    for e in estimates {
        out.push_str(&format!(
            "{:<12} {:>10} {:>10} {:>8} {:>8}\n",
            e.column,
            num(Some(e.estimate), 4),
            num(Some(e.robust_se), 4),
            num(e.z_score(), 2),
            num(e.p_value(), 4)
        ));
    }
    out
}

fn na() -> String {
    "n/a".to_string()
}

fn pct(v: Option<f64>) -> String {
    v.map(|x| format!("{:.2}%", x * 100.0)).unwrap_or_else(na)
}

fn num(v: Option<f64>, digits: usize) -> String {
    v.map(|x| format!("{x:.digits$}")).unwrap_or_else(na)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CandidateFormula, Covariate, Link, Partition, StatsResult, SuccessRates, Term};
    use crate::fit::{CoefficientEstimate, OlsFit, ReturnRegression, SearchOutcome};

    fn summary() -> DatasetSummary {
        DatasetSummary {
            rows_read: 10,
            rows_loaded: 9,
            rows_skipped: 1,
            rows_in_study: 8,
        }
    }

    #[test]
    fn describe_block_for_full_sample() {
        let row = DescribeRow {
            partition: Partition::Country("ESP".to_string()),
            sample: SampleKind::Full,
            outliers: 2,
            stats: StatsResult {
                n: 4,
                arbitrages: Some(1),
                proportion: Some(0.25),
                mean: Some(0.0123),
                std: Some(0.02),
                median: Some(0.01),
                max: Some(0.05),
                min: Some(-0.01),
                skewness: Some(0.5),
                kurtosis: Some(-1.2),
                t_test_p: Some(0.03),
                wilcoxon_p: None,
                bootstrap_ci_lower: Some(-0.001),
                bootstrap_ci_upper: Some(0.025),
            },
        };
        let text = format_describe_row(&row);
        assert!(text.starts_with("==================== ESP - Full Sample ===================="));
        assert!(text.contains("N: 4 / ARB: 1 (25.00%)  - Outliers: 2"));
        assert!(text.contains("Average: 1.23% (2.00%) - t: 0.0300 (-0.0010, 0.0250)"));
        assert!(text.contains("Median: 1.00% - W: n/a"));
        assert!(text.contains("Skewness: 0.50 - Kurtosis: -1.20"));
    }

    #[test]
    fn empty_describe_block() {
        let row = DescribeRow {
            partition: Partition::Region("AFR".to_string()),
            sample: SampleKind::Period(2),
            outliers: 0,
            stats: StatsResult::empty(),
        };
        let text = format_describe_row(&row);
        assert!(text.contains("N: 0 / ARB: n/a (n/a)\n"));
        assert!(!text.contains("Outliers"));
        assert!(!text.contains("Skewness"));
    }

    #[test]
    fn predict_run_reports_each_status() {
        let formula = CandidateFormula::new([Term::Main(Covariate::Dil)]);
        let outcome = SearchOutcome {
            link: Link::Logit,
            formula: formula.extended([Term::Interaction(Covariate::Dil, Covariate::Fin)]),
            pseudo_r2: 0.1234,
            rates: SuccessRates {
                overall: 0.5,
                positive: 0.75,
                negative: 0.25,
            },
            estimates: vec![
                CoefficientEstimate {
                    column: "Intercept".to_string(),
                    estimate: -0.41,
                    robust_se: 0.2,
                },
                CoefficientEstimate {
                    column: "DIL:FIN".to_string(),
                    estimate: 1.23456,
                    robust_se: 0.5,
                },
            ],
            log_likelihood: Some(-7.5),
            stage1_formula: formula,
            stage1_positive_rate: 0.7,
            candidates: 4350,
            fit_failures: 3,
        };
        let row = |link, sample, status| PredictRow {
            country: "FRA".to_string(),
            sample,
            link,
            n: 12,
            status,
        };
        let run = PredictRun {
            dataset: summary(),
            rows: vec![
                row(Link::Logit, SampleKind::Full, PredictStatus::Found(outcome)),
                row(Link::Probit, SampleKind::Full, PredictStatus::NoResult),
                row(Link::Logit, SampleKind::Period(1), PredictStatus::Empty),
                row(Link::Probit, SampleKind::Period(1), PredictStatus::Empty),
            ],
        };
        let text = format_predict_run(&run);
        assert!(text.contains("Results for FRA - Model: LGT - Period: Full Sample"));
        assert!(text.contains("Formula (R2: 12.34%): ARB ~ DIL + DIL * FIN"));
        assert!(text.contains("Success: ARB: 75.00% - nARB: 25.00% - Total: 50.00%"));
        assert!(text.contains("Intercept       -0.4100     0.2000    -2.05   0.0404\n"));
        assert!(text.contains("DIL:FIN          1.2346     0.5000     2.47   0.0135\n"));
        assert!(text.contains("Results for FRA - Model: PRT - Period: Full Sample"));
        assert_eq!(text.matches("Results for FRA - Period: PER1").count(), 1);
        assert!(text.contains("Selected models:"));
    }

    #[test]
    fn regress_run_reports_each_region() {
        let fit = ReturnRegression {
            full: OlsFit {
                formula: "ARR ~ DIL + IDX + ISC + CAP".to_string(),
                n: 42,
                estimates: vec![CoefficientEstimate {
                    column: "DIL".to_string(),
                    estimate: 1.028571,
                    robust_se: 0.212317,
                }],
                r_squared: 0.3141,
                residuals: Vec::new(),
            },
            kw_dil_p: Some(0.81234),
            kw_idx_p: None,
        };
        let run = RegressRun {
            dataset: summary(),
            rows: vec![
                RegressRow {
                    region: "EUR".to_string(),
                    n: 42,
                    status: RegressStatus::Fitted(fit),
                },
                RegressRow {
                    region: "AFR".to_string(),
                    n: 0,
                    status: RegressStatus::Empty,
                },
            ],
        };
        let text = format_regress_run(&run);
        assert!(text.contains("==================== OLS Estimation for: EUR ===================="));
        assert!(text.contains("ARR ~ DIL + IDX + ISC + CAP (N: 42, R2: 31.41%)"));
        assert!(text.contains("DIL              1.0286     0.2123     4.84   0.0000\n"));
        assert!(text.contains("KW Test for DIL: 0.8123\n"));
        assert!(text.contains("KW Test for IDX: n/a\n"));
        assert!(text.contains("OLS Estimation for: AFR ====================\nNo Results available."));
    }
}
