use std::collections::HashSet;

use ndarray::Array2;
use pgsagg::decompose::{center_columns, component_scores, decompose};
use pgsagg::{AggregateConfig, AggregateError, ScoreMatrix, aggregate, aggregate_aligned};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

fn keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("id{i}")).collect()
}

fn cols(m: usize) -> Vec<String> {
    (0..m).map(|j| format!("Pt_{j}")).collect()
}

/// Collinear scores: a shared latent value per row plus column noise.
fn collinear(seed: u64, n: usize, m: usize, missing: f64) -> ScoreMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut values = Array2::zeros((n, m));
    for i in 0..n {
        let latent: f64 = rng.sample(StandardNormal);
        for j in 0..m {
            let noise: f64 = rng.sample(StandardNormal);
            let v = (j as f64 + 1.0) * latent + 0.3 * noise + j as f64;
            values[[i, j]] = if rng.random::<f64>() < missing {
                f64::NAN
            } else {
                v
            };
        }
    }
    ScoreMatrix::new(keys(n), cols(m), values).unwrap()
}

fn scenario() -> ScoreMatrix {
    ScoreMatrix::from_rows(
        vec!["A".into(), "B".into(), "C".into()],
        vec!["s1".into(), "s2".into(), "s3".into()],
        &[
            vec![Some(1.0), Some(1.1), Some(0.9)],
            vec![Some(2.0), Some(2.2), Some(1.8)],
            vec![None, Some(3.0), Some(2.9)],
        ],
    )
    .unwrap()
}

#[test]
fn incomplete_row_is_dropped_when_column_is_kept() {
    let config = AggregateConfig {
        min_valid_fraction: 0.6,
        ..Default::default()
    };
    let out = aggregate(&scenario(), &config).unwrap();
    let got: Vec<&str> = out.keys().collect();
    assert_eq!(got, vec!["A", "B"]);
    assert!(out.scores.iter().all(|(_, v)| v.is_finite()));
    assert!(out.diagnostics.loadings.iter().sum::<f64>() >= 0.0);
    assert_eq!(out.diagnostics.rows_dropped, 1);
    assert!(out.diagnostics.dropped_columns.is_empty());
    // B sits above A on every column
    assert!(out.get("B").unwrap() > out.get("A").unwrap());
}

#[test]
fn low_coverage_column_is_dropped_before_rows() {
    // s1 is valid in 2 of 3 rows, below the 0.75 default
    let out = aggregate(&scenario(), &AggregateConfig::default()).unwrap();
    assert_eq!(out.diagnostics.dropped_columns, vec!["s1"]);
    assert_eq!(out.diagnostics.retained_columns, vec!["s2", "s3"]);
    let got: Vec<&str> = out.keys().collect();
    assert_eq!(got, vec!["A", "B", "C"]);
    assert_eq!(out.diagnostics.rows_dropped, 0);
}

#[test]
fn coverage_threshold_is_inclusive() {
    let nan = f64::NAN;
    let values = ndarray::array![
        [1.0, 2.0, 1.5],
        [2.0, nan, 2.5],
        [3.0, 6.5, 2.0],
        [4.0, 8.0, 4.5],
    ];
    let matrix = ScoreMatrix::new(keys(4), cols(3), values).unwrap();

    let at = AggregateConfig {
        min_valid_fraction: 0.75,
        ..Default::default()
    };
    let out = aggregate(&matrix, &at).unwrap();
    assert_eq!(out.diagnostics.retained_columns.len(), 3);
    assert_eq!(out.scores.len(), 3);

    let above = AggregateConfig {
        min_valid_fraction: 0.75 + f64::EPSILON,
        ..Default::default()
    };
    let out = aggregate(&matrix, &above).unwrap();
    assert_eq!(out.diagnostics.dropped_columns, vec!["Pt_1"]);
    assert_eq!(out.scores.len(), 4);
}

#[test]
fn negated_leading_vector_gives_identical_output() {
    for seed in 0..5 {
        let matrix = collinear(seed, 40, 4, 0.0);
        let centered = center_columns(matrix.values().view(), true).unwrap();
        let d = decompose(centered.x.view()).unwrap();
        let raw = d.right.column(0).to_owned();
        let flipped = raw.mapv(|v| -v);

        let (l1, s1, _) = component_scores(centered.x.view(), &raw);
        let (l2, s2, _) = component_scores(centered.x.view(), &flipped);
        assert!(l1.iter().zip(l2.iter()).all(|(a, b)| a.to_bits() == b.to_bits()));
        assert!(s1.iter().zip(s2.iter()).all(|(a, b)| a.to_bits() == b.to_bits()));
        assert!(l1.sum() >= 0.0);
    }
}

#[test]
fn single_column_is_standardized() {
    let values = ndarray::array![[2.0], [4.0], [9.0], [1.0]];
    let matrix = ScoreMatrix::new(keys(4), cols(1), values.clone()).unwrap();
    let mean = 4.0;
    let sd = ((4.0 + 0.0 + 25.0 + 9.0) / 3.0_f64).sqrt();

    for standardize in [true, false] {
        let config = AggregateConfig {
            standardize,
            ..Default::default()
        };
        let out = aggregate(&matrix, &config).unwrap();
        assert_eq!(out.diagnostics.loadings.len(), 1);
        assert!((out.diagnostics.loadings[0] - 1.0).abs() < 1e-12);
        for (i, (_, score)) in out.scores.iter().enumerate() {
            let expected = (values[[i, 0]] - mean) / sd;
            assert!((score - expected).abs() < 1e-10, "{score} vs {expected}");
        }
        assert!((out.diagnostics.variance_explained - 1.0).abs() < 1e-12);
    }
}

#[test]
fn repeated_runs_are_bit_identical() {
    let matrix = collinear(11, 200, 6, 0.05);
    let config = AggregateConfig {
        min_valid_fraction: 0.5,
        ..Default::default()
    };
    let first = aggregate(&matrix, &config).unwrap();
    let second = aggregate(&matrix, &config).unwrap();
    assert_eq!(first.scores.len(), second.scores.len());
    for ((k1, v1), (k2, v2)) in first.scores.iter().zip(&second.scores) {
        assert_eq!(k1, k2);
        assert_eq!(v1.to_bits(), v2.to_bits());
    }
    assert_eq!(
        first.diagnostics.variance_explained.to_bits(),
        second.diagnostics.variance_explained.to_bits()
    );
}

#[test]
fn output_keys_are_subset_of_input() {
    let config = AggregateConfig {
        min_valid_fraction: 0.5,
        ..Default::default()
    };
    let sparse = collinear(3, 100, 5, 0.1);
    let out = aggregate(&sparse, &config).unwrap();
    let input: HashSet<&str> = sparse.keys().iter().map(|k| k.as_str()).collect();
    let output: HashSet<&str> = out.keys().collect();
    assert!(output.is_subset(&input));
    assert!(output.len() < input.len());

    let dense = collinear(3, 100, 5, 0.0);
    let out = aggregate(&dense, &config).unwrap();
    let input: HashSet<&str> = dense.keys().iter().map(|k| k.as_str()).collect();
    let output: HashSet<&str> = out.keys().collect();
    assert_eq!(output, input);
}

#[test]
fn aligned_output_marks_dropped_rows() {
    let config = AggregateConfig {
        min_valid_fraction: 0.6,
        ..Default::default()
    };
    let out = aggregate_aligned(&scenario(), &config).unwrap();
    assert_eq!(out.keys, vec!["A", "B", "C"]);
    assert!(out.scores[0].is_finite());
    assert!(out.scores[1].is_finite());
    assert!(out.scores[2].is_nan());
}

#[test]
fn collinear_columns_share_one_component() {
    let matrix = collinear(5, 300, 4, 0.0);
    let out = aggregate(&matrix, &AggregateConfig::default()).unwrap();
    assert!(out.diagnostics.variance_explained > 0.9);
    assert!(out.diagnostics.loadings.iter().all(|l| *l > 0.0));
    let norm: f64 = out.diagnostics.loadings.iter().map(|l| l * l).sum();
    assert!((norm - 1.0).abs() < 1e-10);
}

#[test]
fn two_correlated_columns_load_equally() {
    let values = ndarray::array![[1.0, 2.0], [2.0, 1.0], [3.0, 5.0], [4.0, 4.0]];
    let matrix = ScoreMatrix::new(keys(4), cols(2), values).unwrap();
    let out = aggregate(&matrix, &AggregateConfig::default()).unwrap();
    let half = std::f64::consts::FRAC_1_SQRT_2;
    for l in &out.diagnostics.loadings {
        assert!((l - half).abs() < 1e-10);
    }
}

#[test]
fn too_few_complete_rows_is_insufficient() {
    let matrix = ScoreMatrix::from_rows(
        keys(4),
        cols(2),
        &[
            vec![Some(1.0), None],
            vec![None, Some(2.0)],
            vec![Some(3.0), Some(1.0)],
            vec![Some(4.0), None],
        ],
    )
    .unwrap();
    let config = AggregateConfig {
        min_valid_fraction: 0.5,
        ..Default::default()
    };
    let err = aggregate(&matrix, &config).unwrap_err();
    assert!(matches!(err, AggregateError::InsufficientData(_)));
}

#[test]
fn no_column_with_coverage_is_insufficient() {
    let matrix = ScoreMatrix::from_rows(
        keys(4),
        cols(1),
        &[vec![Some(1.0)], vec![None], vec![None], vec![Some(2.0)]],
    )
    .unwrap();
    let err = aggregate(&matrix, &AggregateConfig::default()).unwrap_err();
    assert!(matches!(err, AggregateError::InsufficientData(_)));
}

#[test]
fn constant_columns_are_degenerate() {
    let values = ndarray::array![[1.0, 0.5], [1.0, 0.5], [1.0, 0.5]];
    let matrix = ScoreMatrix::new(keys(3), cols(2), values).unwrap();
    let err = aggregate(&matrix, &AggregateConfig::default()).unwrap_err();
    assert!(matches!(err, AggregateError::DegenerateInput(_)));
}

#[test]
fn one_constant_column_is_reported_and_skipped() {
    let values = ndarray::array![[1.0, 7.0, 2.0], [2.0, 7.0, 4.5], [3.0, 7.0, 5.5]];
    let matrix = ScoreMatrix::new(keys(3), cols(3), values).unwrap();
    let out = aggregate(&matrix, &AggregateConfig::default()).unwrap();
    assert_eq!(out.diagnostics.constant_columns, vec!["Pt_1"]);
    assert_eq!(out.diagnostics.retained_columns, vec!["Pt_0", "Pt_2"]);
}

#[test]
fn invalid_fraction_is_rejected() {
    let config = AggregateConfig {
        min_valid_fraction: 1.5,
        ..Default::default()
    };
    let err = aggregate(&scenario(), &config).unwrap_err();
    assert!(matches!(err, AggregateError::InvalidArgument(_)));
}
