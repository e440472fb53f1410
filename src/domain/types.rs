//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory by the statistics and search engines
//! - exported to JSON for downstream tables
//! - rebuilt from CSV by the loader or the synthetic generator

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Default study regions, in report order.
pub const DEFAULT_REGIONS: [&str; 4] = ["AFR", "AME", "ASI", "EUR"];

/// Default study markets as `(region, country)` pairs, in report order.
pub const DEFAULT_MARKETS: [(&str, &str); 27] = [
    ("AFR", "EGY"),
    ("AFR", "SAU"),
    ("AFR", "TUN"),
    ("AME", "BRA"),
    ("AME", "CAN"),
    ("AME", "USA"),
    ("ASI", "AUS"),
    ("ASI", "HKG"),
    ("ASI", "IND"),
    ("ASI", "MYS"),
    ("ASI", "NZL"),
    ("ASI", "PAK"),
    ("ASI", "SGP"),
    ("ASI", "LKA"),
    ("EUR", "AUT"),
    ("EUR", "BEL"),
    ("EUR", "DNK"),
    ("EUR", "FIN"),
    ("EUR", "FRA"),
    ("EUR", "DEU"),
    ("EUR", "GRC"),
    ("EUR", "ITA"),
    ("EUR", "NOR"),
    ("EUR", "POL"),
    ("EUR", "ESP"),
    ("EUR", "SWE"),
    ("EUR", "GBR"),
];

/// Default country list (derived from `DEFAULT_MARKETS`).
pub fn default_countries() -> Vec<String> {
    DEFAULT_MARKETS.iter().map(|(_, c)| c.to_string()).collect()
}

/// Default region list.
pub fn default_regions() -> Vec<String> {
    DEFAULT_REGIONS.iter().map(|r| r.to_string()).collect()
}

/// A model covariate (one CSV column).
///
/// Ratio-valued: `DIL`, `ISC`, `CAP`. Everything else is a 0/1 dummy: index
/// membership, issue purpose, and the twelve economic sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Covariate {
    Dil,
    Idx,
    Isc,
    Cap,
    Gen,
    Acq,
    Inv,
    Ref,
    Aca,
    Bas,
    Cyc,
    Ncy,
    Ene,
    Fin,
    Gov,
    Hea,
    Ind,
    Est,
    Tec,
    Uti,
}

impl Covariate {
    pub const COUNT: usize = 20;

    pub const ALL: [Covariate; Covariate::COUNT] = [
        Covariate::Dil,
        Covariate::Idx,
        Covariate::Isc,
        Covariate::Cap,
        Covariate::Gen,
        Covariate::Acq,
        Covariate::Inv,
        Covariate::Ref,
        Covariate::Aca,
        Covariate::Bas,
        Covariate::Cyc,
        Covariate::Ncy,
        Covariate::Ene,
        Covariate::Fin,
        Covariate::Gov,
        Covariate::Hea,
        Covariate::Ind,
        Covariate::Est,
        Covariate::Tec,
        Covariate::Uti,
    ];

    /// Base terms searched in stage 1.
    pub const BASE: [Covariate; 8] = [
        Covariate::Dil,
        Covariate::Idx,
        Covariate::Isc,
        Covariate::Cap,
        Covariate::Gen,
        Covariate::Acq,
        Covariate::Inv,
        Covariate::Ref,
    ];

    /// Issue-purpose dummies.
    pub const PURPOSES: [Covariate; 4] =
        [Covariate::Gen, Covariate::Acq, Covariate::Inv, Covariate::Ref];

    /// Economic sector dummies.
    pub const SECTORS: [Covariate; 12] = [
        Covariate::Aca,
        Covariate::Bas,
        Covariate::Cyc,
        Covariate::Ncy,
        Covariate::Ene,
        Covariate::Fin,
        Covariate::Gov,
        Covariate::Hea,
        Covariate::Ind,
        Covariate::Est,
        Covariate::Tec,
        Covariate::Uti,
    ];

    /// CSV column name.
    pub fn column(self) -> &'static str {
        match self {
            Covariate::Dil => "DIL",
            Covariate::Idx => "IDX",
            Covariate::Isc => "ISC",
            Covariate::Cap => "CAP",
            Covariate::Gen => "GEN",
            Covariate::Acq => "ACQ",
            Covariate::Inv => "INV",
            Covariate::Ref => "REF",
            Covariate::Aca => "ACA",
            Covariate::Bas => "BAS",
            Covariate::Cyc => "CYC",
            Covariate::Ncy => "NCY",
            Covariate::Ene => "ENE",
            Covariate::Fin => "FIN",
            Covariate::Gov => "GOV",
            Covariate::Hea => "HEA",
            Covariate::Ind => "IND",
            Covariate::Est => "EST",
            Covariate::Tec => "TEC",
            Covariate::Uti => "UTI",
        }
    }

    /// Position inside `Observation::covariates`.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Covariate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// One rights-issue event.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Source line (CSV) or generation index.
    pub line: usize,
    /// Arbitrage return (`ARR`), `None` when missing.
    pub ret: Option<f64>,
    /// Arbitrage event flag (`ARB`).
    pub arbitrage: bool,
    /// Outlier flag (`OUT`).
    pub outlier: bool,
    /// Covariate values indexed by `Covariate::index`; NaN when missing.
    pub covariates: [f64; Covariate::COUNT],
    pub region: String,
    pub country: String,
    /// Period tag (`PER1`, `PER2`, `PER3`).
    pub period: String,
}

impl Observation {
    pub fn value(&self, covariate: Covariate) -> f64 {
        self.covariates[covariate.index()]
    }
}

/// A borrowed, ordered view over observations.
///
/// Slices never own data; each engine call gets its own slice.
#[derive(Debug, Clone, Default)]
pub struct SampleSlice<'a> {
    rows: Vec<&'a Observation>,
}

impl<'a> SampleSlice<'a> {
    pub fn from_observations(observations: &'a [Observation]) -> Self {
        Self {
            rows: observations.iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Observation> + '_ {
        self.rows.iter().copied()
    }

    /// Keep only rows matching `keep`.
    pub fn filter(&self, keep: impl Fn(&Observation) -> bool) -> SampleSlice<'a> {
        SampleSlice {
            rows: self.rows.iter().copied().filter(|o| keep(o)).collect(),
        }
    }

    /// Non-missing returns, in row order.
    pub fn returns(&self) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|o| o.ret)
            .filter(|v| !v.is_nan())
            .collect()
    }

    /// Outcome flags, in row order.
    pub fn outcomes(&self) -> Vec<bool> {
        self.rows.iter().map(|o| o.arbitrage).collect()
    }
}

/// One model term: a main effect or a pairwise interaction.
///
/// An interaction `a * b` expands to `a + b + a:b` in the design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    Main(Covariate),
    Interaction(Covariate, Covariate),
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Main(c) => write!(f, "{c}"),
            Term::Interaction(a, b) => write!(f, "{a} * {b}"),
        }
    }
}

/// An ordered set of terms defining one candidate model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateFormula {
    terms: Vec<Term>,
}

impl CandidateFormula {
    /// Build a formula; repeated terms keep their first position.
    pub fn new(terms: impl IntoIterator<Item = Term>) -> Self {
        let mut out: Vec<Term> = Vec::new();
        for term in terms {
            if !out.contains(&term) {
                out.push(term);
            }
        }
        Self { terms: out }
    }

    /// A new formula with `more` appended after the current terms.
    pub fn extended(&self, more: impl IntoIterator<Item = Term>) -> Self {
        Self::new(self.terms.iter().copied().chain(more))
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }
}

impl fmt::Display for CandidateFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ARB ~ ")?;
        if self.terms.is_empty() {
            return f.write_str("1");
        }
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            write!(f, "{term}")?;
        }
        Ok(())
    }
}

/// Binary-response link function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Link {
    Logit,
    Probit,
}

impl Link {
    /// Short label used in report headers.
    pub fn label(self) -> &'static str {
        match self {
            Link::Logit => "LGT",
            Link::Probit => "PRT",
        }
    }
}

/// Descriptive statistics and test results for one sample.
///
/// `None` means "undefined". With `n == 0` every other field is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsResult {
    pub n: usize,
    pub arbitrages: Option<usize>,
    pub proportion: Option<f64>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub median: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
    pub t_test_p: Option<f64>,
    pub wilcoxon_p: Option<f64>,
    pub bootstrap_ci_lower: Option<f64>,
    pub bootstrap_ci_upper: Option<f64>,
}

impl StatsResult {
    pub fn empty() -> Self {
        Self {
            n: 0,
            arbitrages: None,
            proportion: None,
            mean: None,
            std: None,
            median: None,
            max: None,
            min: None,
            skewness: None,
            kurtosis: None,
            t_test_p: None,
            wilcoxon_p: None,
            bootstrap_ci_lower: None,
            bootstrap_ci_upper: None,
        }
    }
}

/// Hit rates produced by the success scorer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SuccessRates {
    pub overall: f64,
    pub positive: f64,
    pub negative: f64,
}

/// Subsamples used by the descriptive and predictive runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleKind {
    /// Full sample.
    Full,
    /// One period (`PER1`..`PER3`).
    Period(u8),
    /// Dilutive offerings (`DIL >= 0.5`).
    Dilutive,
    /// Non-dilutive offerings (`DIL < 0.5`).
    NonDilutive,
    /// Companies in the main stock index (`IDX == 1`).
    Indexed,
    /// Companies outside the main stock index (`IDX == 0`).
    NonIndexed,
}

impl SampleKind {
    /// Subsamples reported by the descriptive run.
    pub const DESCRIBE: [SampleKind; 8] = [
        SampleKind::Full,
        SampleKind::Period(1),
        SampleKind::Period(2),
        SampleKind::Period(3),
        SampleKind::Dilutive,
        SampleKind::NonDilutive,
        SampleKind::Indexed,
        SampleKind::NonIndexed,
    ];

    /// Subsamples used by the predictive run.
    pub const PREDICT: [SampleKind; 4] = [
        SampleKind::Full,
        SampleKind::Period(1),
        SampleKind::Period(2),
        SampleKind::Period(3),
    ];

    pub fn label(self) -> String {
        match self {
            SampleKind::Full => "Full Sample".to_string(),
            SampleKind::Period(p) => format!("PER{p}"),
            SampleKind::Dilutive => "DIL".to_string(),
            SampleKind::NonDilutive => "nDIL".to_string(),
            SampleKind::Indexed => "IDX".to_string(),
            SampleKind::NonIndexed => "nIDX".to_string(),
        }
    }

    pub fn matches(self, obs: &Observation) -> bool {
        match self {
            SampleKind::Full => true,
            SampleKind::Period(p) => obs.period == format!("PER{p}"),
            SampleKind::Dilutive => obs.value(Covariate::Dil) >= 0.5,
            SampleKind::NonDilutive => obs.value(Covariate::Dil) < 0.5,
            SampleKind::Indexed => obs.value(Covariate::Idx) == 1.0,
            SampleKind::NonIndexed => obs.value(Covariate::Idx) == 0.0,
        }
    }
}

/// A data partition: the whole dataset, a region, or a country.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partition {
    Total,
    Region(String),
    Country(String),
}

impl Partition {
    pub fn label(&self) -> &str {
        match self {
            Partition::Total => "Total",
            Partition::Region(r) => r,
            Partition::Country(c) => c,
        }
    }

    pub fn matches(&self, obs: &Observation) -> bool {
        match self {
            Partition::Total => true,
            Partition::Region(r) => &obs.region == r,
            Partition::Country(c) => &obs.country == c,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults and environment).
#[derive(Debug, Clone)]
pub struct StudyConfig {
    pub data_path: PathBuf,
    pub regions: Vec<String>,
    pub countries: Vec<String>,

    /// Bootstrap seed (injected per call, never global).
    pub bootstrap_seed: u64,
    pub bootstrap_resamples: usize,

    pub links: Vec<Link>,
    pub max_iter: usize,
    /// Optional per-candidate fit budget in milliseconds.
    pub fit_timeout_ms: Option<u64>,

    pub export: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(dil: f64, idx: f64, period: &str) -> Observation {
        let mut covariates = [0.0; Covariate::COUNT];
        covariates[Covariate::Dil.index()] = dil;
        covariates[Covariate::Idx.index()] = idx;
        Observation {
            line: 0,
            ret: Some(0.01),
            arbitrage: false,
            outlier: false,
            covariates,
            region: "EUR".to_string(),
            country: "ESP".to_string(),
            period: period.to_string(),
        }
    }

    #[test]
    fn covariate_indices_follow_declaration_order() {
        for (i, c) in Covariate::ALL.iter().enumerate() {
            assert_eq!(c.index(), i);
        }
    }

    #[test]
    fn formula_drops_repeated_terms_and_renders() {
        let f = CandidateFormula::new([
            Term::Main(Covariate::Dil),
            Term::Main(Covariate::Idx),
            Term::Main(Covariate::Dil),
        ]);
        assert_eq!(f.terms().len(), 2);

        let g = f.extended([Term::Interaction(Covariate::Dil, Covariate::Aca)]);
        assert_eq!(g.to_string(), "ARB ~ DIL + IDX + DIL * ACA");
        // The original is untouched.
        assert_eq!(f.to_string(), "ARB ~ DIL + IDX");
    }

    #[test]
    fn sample_kinds_split_on_thresholds() {
        let a = obs(0.5, 1.0, "PER2");
        let b = obs(0.49, 0.0, "PER1");
        assert!(SampleKind::Dilutive.matches(&a));
        assert!(SampleKind::NonDilutive.matches(&b));
        assert!(SampleKind::Indexed.matches(&a));
        assert!(SampleKind::NonIndexed.matches(&b));
        assert!(SampleKind::Period(2).matches(&a));
        assert!(!SampleKind::Period(2).matches(&b));
    }

    #[test]
    fn slice_returns_drop_missing_values() {
        let mut a = obs(1.0, 0.0, "PER1");
        let mut b = obs(1.0, 0.0, "PER1");
        a.ret = None;
        b.ret = Some(f64::NAN);
        let c = obs(1.0, 0.0, "PER1");
        let data = vec![a, b, c];
        let slice = SampleSlice::from_observations(&data);
        assert_eq!(slice.len(), 3);
        assert_eq!(slice.returns(), vec![0.01]);
    }
}
