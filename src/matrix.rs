use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{AggregateError, Result};

/// Stacks equally long column vectors into an `n x m` matrix.
pub fn from_columns(columns: &[Vec<f64>]) -> Result<Array2<f64>> {
    let m = columns.len();
    let n = columns.first().map(|c| c.len()).unwrap_or(0);
    let mut out = Array2::from_elem((n, m), f64::NAN);
    for (j, col) in columns.iter().enumerate() {
        if col.len() != n {
            return Err(AggregateError::InvalidArgument(format!(
                "column {j} has {} values, expected {n}",
                col.len()
            )));
        }
        for (i, v) in col.iter().enumerate() {
            out[[i, j]] = *v;
        }
    }
    Ok(out)
}

pub fn select(values: ArrayView2<'_, f64>, rows: &[usize], cols: &[usize]) -> Array2<f64> {
    let mut out = Array2::zeros((rows.len(), cols.len()));
    for (oi, &i) in rows.iter().enumerate() {
        for (oj, &j) in cols.iter().enumerate() {
            out[[oi, oj]] = values[[i, j]];
        }
    }
    out
}

pub fn valid_counts(values: ArrayView2<'_, f64>) -> Vec<usize> {
    values
        .axis_iter(Axis(1))
        .map(|col| col.iter().filter(|v| !v.is_nan()).count())
        .collect()
}

/// Mean and sample standard deviation (ddof = 1) of each column.
pub fn column_moments(values: ArrayView2<'_, f64>) -> Vec<(f64, f64)> {
    let n = values.nrows();
    values
        .axis_iter(Axis(1))
        .map(|col| {
            if n == 0 {
                return (f64::NAN, f64::NAN);
            }
            let mean = col.sum() / n as f64;
            if n < 2 {
                return (mean, 0.0);
            }
            let ss: f64 = col.iter().map(|v| (v - mean) * (v - mean)).sum();
            (mean, (ss / (n - 1) as f64).sqrt())
        })
        .collect()
}
