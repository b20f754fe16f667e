use std::collections::HashSet;

use ndarray::{Array1, Array2};

use crate::error::{AggregateError, Result};

/// Per-entity scores at several analysis settings. Missing cells are `NaN`.
#[derive(Debug, Clone)]
pub struct ScoreMatrix {
    keys: Vec<String>,
    columns: Vec<String>,
    values: Array2<f64>,
}

impl ScoreMatrix {
    pub fn new(keys: Vec<String>, columns: Vec<String>, mut values: Array2<f64>) -> Result<Self> {
        let (n, m) = values.dim();
        if keys.len() != n {
            return Err(AggregateError::InvalidArgument(format!(
                "{} row keys supplied for a matrix with {n} rows",
                keys.len()
            )));
        }
        if columns.len() != m {
            return Err(AggregateError::InvalidArgument(format!(
                "{} column names supplied for a matrix with {m} columns",
                columns.len()
            )));
        }
        let mut seen = HashSet::with_capacity(n);
        for key in &keys {
            if !seen.insert(key.as_str()) {
                return Err(AggregateError::DuplicateKey(key.clone()));
            }
        }
        let mut seen_cols = HashSet::with_capacity(m);
        for col in &columns {
            if !seen_cols.insert(col.as_str()) {
                return Err(AggregateError::InvalidArgument(format!(
                    "duplicate score column {col}"
                )));
            }
        }
        values.mapv_inplace(|v| if v.is_finite() { v } else { f64::NAN });
        Ok(Self {
            keys,
            columns,
            values,
        })
    }

    /// Builds a matrix from rows of optional values, `None` marking a missing cell.
    pub fn from_rows(
        keys: Vec<String>,
        columns: Vec<String>,
        rows: &[Vec<Option<f64>>],
    ) -> Result<Self> {
        let m = columns.len();
        let mut data = Vec::with_capacity(rows.len() * m);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != m {
                return Err(AggregateError::InvalidArgument(format!(
                    "row {i} has {} values, expected {m}",
                    row.len()
                )));
            }
            data.extend(row.iter().map(|v| v.unwrap_or(f64::NAN)));
        }
        let values = Array2::from_shape_vec((rows.len(), m), data)
            .map_err(|e| AggregateError::InvalidArgument(e.to_string()))?;
        Self::new(keys, columns, values)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateConfig {
    pub min_valid_fraction: f64,
    pub standardize: bool,
    pub min_rows: usize,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            min_valid_fraction: 0.75,
            standardize: true,
            min_rows: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecompositionResult {
    /// Decreasing.
    pub singular_values: Array1<f64>,
    /// Thin left singular vectors, one column per component.
    pub left: Array2<f64>,
    /// Right singular vectors (loadings), one column per component.
    pub right: Array2<f64>,
    pub n_samples: usize,
}

impl DecompositionResult {
    pub fn variance_explained(&self) -> f64 {
        let total: f64 = self.singular_values.iter().map(|s| s * s).sum();
        match self.singular_values.first() {
            Some(s) if total > 0.0 => s * s / total,
            _ => f64::NAN,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregateDiagnostics {
    pub retained_columns: Vec<String>,
    pub dropped_columns: Vec<String>,
    pub constant_columns: Vec<String>,
    pub rows_in: usize,
    pub rows_dropped: usize,
    pub rows_used: usize,
    pub loadings: Vec<f64>,
    pub leading_singular_value: f64,
    pub variance_explained: f64,
}

#[derive(Debug, Clone)]
pub struct AggregateOutput {
    /// Retained rows in input order.
    pub scores: Vec<(String, f64)>,
    pub diagnostics: AggregateDiagnostics,
}

impl AggregateOutput {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.scores.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }
}

#[derive(Debug, Clone)]
pub struct AlignedOutput {
    pub keys: Vec<String>,
    /// One value per input row; `NaN` where the row was dropped.
    pub scores: Vec<f64>,
    pub diagnostics: AggregateDiagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_keys_rejected() {
        let err = ScoreMatrix::from_rows(
            vec!["a".into(), "a".into()],
            vec!["p1".into()],
            &[vec![Some(1.0)], vec![Some(2.0)]],
        )
        .unwrap_err();
        assert!(matches!(err, AggregateError::DuplicateKey(k) if k == "a"));
    }

    #[test]
    fn infinite_values_become_missing() {
        let m = ScoreMatrix::from_rows(
            vec!["a".into()],
            vec!["p1".into(), "p2".into()],
            &[vec![Some(f64::INFINITY), Some(1.0)]],
        )
        .unwrap();
        assert!(m.values()[[0, 0]].is_nan());
        assert_eq!(m.values()[[0, 1]], 1.0);
    }
}
