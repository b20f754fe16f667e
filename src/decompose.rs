use ndarray::{Array1, Array2, ArrayView2, s};
use ndarray_linalg::{Eigh, UPLO};

use crate::error::{AggregateError, Result};
use crate::matrix::column_moments;
use crate::types::DecompositionResult;

const CONSTANT_TOL: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct Centered {
    pub x: Array2<f64>,
    /// Input column indices present in `x`, in order.
    pub kept: Vec<usize>,
    /// Input column indices dropped for zero variance.
    pub constant: Vec<usize>,
}

/// Centres every column and, if `standardize`, scales it to unit sample
/// variance. Zero-variance columns are removed; if none remain the input
/// is degenerate.
pub fn center_columns(x: ArrayView2<'_, f64>, standardize: bool) -> Result<Centered> {
    let moments = column_moments(x);
    let mut kept = Vec::with_capacity(moments.len());
    let mut constant = Vec::new();
    for (j, (mean, sd)) in moments.iter().enumerate() {
        if !mean.is_finite() || !sd.is_finite() {
            return Err(AggregateError::InvalidArgument(format!(
                "column {j} has non-finite summary statistics"
            )));
        }
        if *sd <= CONSTANT_TOL * mean.abs().max(1.0) {
            constant.push(j);
        } else {
            kept.push(j);
        }
    }
    if kept.is_empty() {
        return Err(AggregateError::DegenerateInput(format!(
            "all {} retained columns have zero variance",
            moments.len()
        )));
    }

    let mut out = Array2::zeros((x.nrows(), kept.len()));
    for (oj, &j) in kept.iter().enumerate() {
        let (mean, sd) = moments[j];
        let scale = if standardize { sd } else { 1.0 };
        let mut col = out.column_mut(oj);
        col.assign(&x.column(j));
        col.mapv_inplace(|v| (v - mean) / scale);
    }
    Ok(Centered {
        x: out,
        kept,
        constant,
    })
}

/// Full decomposition of a centred matrix through the symmetric
/// eigen-decomposition of `XᵀX`.
pub fn decompose(x: ArrayView2<'_, f64>) -> Result<DecompositionResult> {
    let (n, p) = x.dim();
    if n == 0 || p == 0 {
        return Err(AggregateError::InsufficientData(format!(
            "cannot decompose a {n}x{p} matrix"
        )));
    }
    let gram = x.t().dot(&x);
    let (eigvals, eigvecs) = gram
        .eigh(UPLO::Lower)
        .map_err(|e| AggregateError::Decomposition(e.to_string()))?;

    // eigh returns ascending eigenvalues
    let order: Vec<usize> = (0..p).rev().collect();
    let singular_values: Array1<f64> = order
        .iter()
        .map(|&k| eigvals[k].max(0.0).sqrt())
        .collect();
    let mut right = Array2::zeros((p, p));
    for (out_k, &k) in order.iter().enumerate() {
        right.column_mut(out_k).assign(&eigvecs.column(k));
    }

    let projected = x.dot(&right);
    let mut left = Array2::zeros((n, p));
    let tol = singular_values[0] * f64::EPSILON * n.max(p) as f64;
    for (k, s_k) in singular_values.iter().enumerate() {
        if *s_k > tol {
            let col = projected.column(k).mapv(|v| v / s_k);
            left.column_mut(k).assign(&col);
        }
    }

    Ok(DecompositionResult {
        singular_values,
        left,
        right,
        n_samples: n,
    })
}

/// Orients a loading vector so its entries sum to a non-negative value.
/// An exactly zero sum falls back to making the first non-zero loading
/// positive. Returns whether the vector was negated.
pub fn normalize_sign(loadings: &mut Array1<f64>) -> bool {
    let total = loadings.sum();
    let flip = if total == 0.0 {
        loadings.iter().find(|v| **v != 0.0).is_some_and(|v| *v < 0.0)
    } else {
        total < 0.0
    };
    if flip {
        loadings.mapv_inplace(|v| -v);
    }
    flip
}

/// Sign-normalises `raw_loadings` and projects every row of `x` onto it.
pub fn component_scores(
    x: ArrayView2<'_, f64>,
    raw_loadings: &Array1<f64>,
) -> (Array1<f64>, Array1<f64>, bool) {
    let mut loadings = raw_loadings.clone();
    let flipped = normalize_sign(&mut loadings);
    let scores = x.dot(&loadings);
    (loadings, scores, flipped)
}

/// Leading component of `x`: sign-normalised loadings and per-row scores,
/// with the decomposition's first singular pair oriented to match.
pub fn leading_component(
    x: ArrayView2<'_, f64>,
) -> Result<(Array1<f64>, Array1<f64>, DecompositionResult)> {
    let mut decomposition = decompose(x)?;
    let raw = decomposition.right.column(0).to_owned();
    let (loadings, scores, flipped) = component_scores(x, &raw);
    if flipped {
        decomposition
            .right
            .slice_mut(s![.., 0])
            .mapv_inplace(|v| -v);
        decomposition
            .left
            .slice_mut(s![.., 0])
            .mapv_inplace(|v| -v);
    }
    Ok((loadings, scores, decomposition))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn sign_follows_loading_sum() {
        let mut v = array![-0.6, -0.8];
        assert!(normalize_sign(&mut v));
        assert_eq!(v, array![0.6, 0.8]);

        let mut v = array![0.9, -0.1];
        assert!(!normalize_sign(&mut v));
    }

    #[test]
    fn zero_sum_uses_first_nonzero_loading() {
        let mut v = array![0.0, -0.5, 0.5];
        assert!(normalize_sign(&mut v));
        assert_eq!(v, array![0.0, 0.5, -0.5]);
    }

    #[test]
    fn constant_columns_are_removed() {
        let x = array![[1.0, 3.0, 2.0], [2.0, 3.0, 4.0], [3.0, 3.0, 9.0]];
        let centered = center_columns(x.view(), true).unwrap();
        assert_eq!(centered.kept, vec![0, 2]);
        assert_eq!(centered.constant, vec![1]);
        let sum: f64 = centered.x.column(0).sum();
        assert!(sum.abs() < 1e-12);
    }

    #[test]
    fn all_constant_is_degenerate() {
        let x = array![[1.0, 3.0], [1.0, 3.0], [1.0, 3.0]];
        let err = center_columns(x.view(), false).unwrap_err();
        assert!(matches!(err, AggregateError::DegenerateInput(_)));
    }

    #[test]
    fn singular_values_reconstruct_gram_trace() {
        let x = array![[-1.0, -2.0], [0.0, 0.5], [1.0, 1.5]];
        let d = decompose(x.view()).unwrap();
        assert!(d.singular_values[0] >= d.singular_values[1]);
        let trace: f64 = x.iter().map(|v| v * v).sum();
        let ss: f64 = d.singular_values.iter().map(|s| s * s).sum();
        assert!((trace - ss).abs() < 1e-10);
        let u0 = d.left.column(0);
        let norm: f64 = u0.iter().map(|v| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-10);
    }
}
