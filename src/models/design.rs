//! Mapping from a `CandidateFormula` to design-matrix columns.
//!
//! Column order:
//! 1. intercept
//! 2. main effects, in order of first appearance (an interaction `a * b`
//!    contributes `a` and `b` here)
//! 3. products `a:b`, in order of appearance
//!
//! The mapping is pure: the same formula always yields the same columns.

use std::fmt;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::domain::{CandidateFormula, Covariate, Observation, SampleSlice, Term};

/// One column of the design matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DesignColumn {
    Intercept,
    Main(Covariate),
    Product(Covariate, Covariate),
}

impl DesignColumn {
    pub fn value(self, obs: &Observation) -> f64 {
        match self {
            DesignColumn::Intercept => 1.0,
            DesignColumn::Main(c) => obs.value(c),
            DesignColumn::Product(a, b) => obs.value(a) * obs.value(b),
        }
    }
}

impl fmt::Display for DesignColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesignColumn::Intercept => f.write_str("Intercept"),
            DesignColumn::Main(c) => write!(f, "{c}"),
            DesignColumn::Product(a, b) => write!(f, "{a}:{b}"),
        }
    }
}

/// Design columns for `formula`.
pub fn design_columns(formula: &CandidateFormula) -> Vec<DesignColumn> {
    let mut mains: Vec<DesignColumn> = Vec::new();
    let mut products: Vec<DesignColumn> = Vec::new();

    let push = |list: &mut Vec<DesignColumn>, col: DesignColumn| {
        if !list.contains(&col) {
            list.push(col);
        }
    };

    for term in formula.terms() {
        match *term {
            Term::Main(c) => push(&mut mains, DesignColumn::Main(c)),
            Term::Interaction(a, b) => {
                push(&mut mains, DesignColumn::Main(a));
                push(&mut mains, DesignColumn::Main(b));
                push(&mut products, DesignColumn::Product(a, b));
            }
        }
    }

    let mut out = Vec::with_capacity(1 + mains.len() + products.len());
    out.push(DesignColumn::Intercept);
    out.extend(mains);
    out.extend(products);
    out
}

/// Fill a design row for one observation.
///
/// # Panics
/// Panics if `out` is shorter than `columns`. Callers size the row from the
/// column list.
pub fn fill_design_row(columns: &[DesignColumn], obs: &Observation, out: &mut [f64]) {
    for (slot, col) in out.iter_mut().zip(columns) {
        *slot = col.value(obs);
    }
}

/// Build the `n × p` design matrix for a slice.
pub fn build_design(columns: &[DesignColumn], slice: &SampleSlice<'_>) -> DMatrix<f64> {
    let n = slice.len();
    let p = columns.len();
    let mut x = DMatrix::<f64>::zeros(n, p);
    let mut row = vec![0.0; p];
    for (i, obs) in slice.iter().enumerate() {
        fill_design_row(columns, obs, &mut row);
        for (j, v) in row.iter().enumerate() {
            x[(i, j)] = *v;
        }
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interaction_expands_to_mains_and_product() {
        let formula = CandidateFormula::new([
            Term::Main(Covariate::Dil),
            Term::Main(Covariate::Idx),
            Term::Interaction(Covariate::Dil, Covariate::Aca),
            Term::Interaction(Covariate::Dil, Covariate::Fin),
        ]);
        let cols = design_columns(&formula);
        assert_eq!(
            cols,
            vec![
                DesignColumn::Intercept,
                DesignColumn::Main(Covariate::Dil),
                DesignColumn::Main(Covariate::Idx),
                DesignColumn::Main(Covariate::Aca),
                DesignColumn::Main(Covariate::Fin),
                DesignColumn::Product(Covariate::Dil, Covariate::Aca),
                DesignColumn::Product(Covariate::Dil, Covariate::Fin),
            ]
        );
        let names: Vec<String> = cols.iter().map(|c| c.to_string()).collect();
        assert_eq!(names[5], "DIL:ACA");
    }

    #[test]
    fn design_matrix_values() {
        let mut covariates = [0.0; Covariate::COUNT];
        covariates[Covariate::Dil.index()] = 0.8;
        covariates[Covariate::Aca.index()] = 1.0;
        let obs = Observation {
            line: 2,
            ret: Some(0.0),
            arbitrage: true,
            outlier: false,
            covariates,
            region: "ASI".to_string(),
            country: "IND".to_string(),
            period: "PER3".to_string(),
        };
        let data = vec![obs];
        let slice = SampleSlice::from_observations(&data);
        let formula = CandidateFormula::new([Term::Interaction(Covariate::Dil, Covariate::Aca)]);
        let x = build_design(&design_columns(&formula), &slice);
        assert_eq!(x.shape(), (1, 4));
        assert_eq!(x[(0, 0)], 1.0);
        assert_eq!(x[(0, 1)], 0.8);
        assert_eq!(x[(0, 2)], 1.0);
        assert_eq!(x[(0, 3)], 0.8);
    }
}
