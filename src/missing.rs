use ndarray::ArrayView2;
use tracing::debug;

use crate::matrix::valid_counts;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissingFilter {
    pub retained_cols: Vec<usize>,
    pub dropped_cols: Vec<usize>,
    pub retained_rows: Vec<usize>,
    pub dropped_rows: Vec<usize>,
}

/// Splits column indices into (retained, dropped) by the fraction of
/// non-missing rows. A column exactly at `min_valid_fraction` is retained.
pub fn coverage_filter(
    values: ArrayView2<'_, f64>,
    min_valid_fraction: f64,
) -> (Vec<usize>, Vec<usize>) {
    let n = values.nrows();
    let mut retained = Vec::new();
    let mut dropped = Vec::new();
    for (j, valid) in valid_counts(values).into_iter().enumerate() {
        let keep = n > 0 && valid as f64 / n as f64 >= min_valid_fraction;
        if keep {
            retained.push(j);
        } else {
            debug!("column {j}: {valid}/{n} valid rows, below {min_valid_fraction}");
            dropped.push(j);
        }
    }
    (retained, dropped)
}

/// Splits row indices into (complete, incomplete) over the given columns.
pub fn complete_rows(values: ArrayView2<'_, f64>, cols: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut complete = Vec::new();
    let mut incomplete = Vec::new();
    for (i, row) in values.rows().into_iter().enumerate() {
        if cols.iter().all(|&j| !row[j].is_nan()) {
            complete.push(i);
        } else {
            incomplete.push(i);
        }
    }
    (complete, incomplete)
}

pub fn filter_missing(values: ArrayView2<'_, f64>, min_valid_fraction: f64) -> MissingFilter {
    let (retained_cols, dropped_cols) = coverage_filter(values, min_valid_fraction);
    let (retained_rows, dropped_rows) = complete_rows(values, &retained_cols);
    MissingFilter {
        retained_cols,
        dropped_cols,
        retained_rows,
        dropped_rows,
    }
}
