use tracing::{debug, info, warn};

use crate::decompose::{center_columns, leading_component};
use crate::error::{AggregateError, Result};
use crate::matrix::select;
use crate::missing::filter_missing;
use crate::qc::check_config;
use crate::types::{
    AggregateConfig, AggregateDiagnostics, AggregateOutput, AlignedOutput, ScoreMatrix,
};

/// Collapses collinear score columns into one leading-component score per row.
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    config: AggregateConfig,
}

impl ScoreAggregator {
    pub fn new(config: AggregateConfig) -> Result<Self> {
        check_config(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AggregateConfig {
        &self.config
    }

    pub fn aggregate(&self, matrix: &ScoreMatrix) -> Result<AggregateOutput> {
        let (rows, scores, diagnostics) = self.run(matrix)?;
        let scores = rows
            .into_iter()
            .zip(scores)
            .map(|(i, v)| (matrix.keys()[i].clone(), v))
            .collect();
        Ok(AggregateOutput {
            scores,
            diagnostics,
        })
    }

    /// Same as [`aggregate`](Self::aggregate) but returns one value per
    /// input row, `NaN` for rows removed by the missingness filter.
    pub fn aggregate_aligned(&self, matrix: &ScoreMatrix) -> Result<AlignedOutput> {
        let (rows, scores, diagnostics) = self.run(matrix)?;
        let mut aligned = vec![f64::NAN; matrix.nrows()];
        for (i, v) in rows.into_iter().zip(scores) {
            aligned[i] = v;
        }
        Ok(AlignedOutput {
            keys: matrix.keys().to_vec(),
            scores: aligned,
            diagnostics,
        })
    }

    fn run(&self, matrix: &ScoreMatrix) -> Result<(Vec<usize>, Vec<f64>, AggregateDiagnostics)> {
        let config = &self.config;
        let (n, m) = (matrix.nrows(), matrix.ncols());
        if n == 0 || m == 0 {
            return Err(AggregateError::InsufficientData(format!(
                "score matrix is {n}x{m}"
            )));
        }

        let values = matrix.values().view();
        let filter = filter_missing(values, config.min_valid_fraction);
        let dropped_columns: Vec<String> = filter
            .dropped_cols
            .iter()
            .map(|&j| matrix.columns()[j].clone())
            .collect();
        if !dropped_columns.is_empty() {
            warn!(
                "Dropping {} column(s) below {} coverage: {}",
                dropped_columns.len(),
                config.min_valid_fraction,
                dropped_columns.join(", ")
            );
        }
        if filter.retained_cols.is_empty() {
            return Err(AggregateError::InsufficientData(format!(
                "no column reaches {} non-missing coverage",
                config.min_valid_fraction
            )));
        }
        if filter.retained_rows.len() < config.min_rows {
            return Err(AggregateError::InsufficientData(format!(
                "{} complete row(s) remain after filtering, at least {} required",
                filter.retained_rows.len(),
                config.min_rows
            )));
        }
        if !filter.dropped_rows.is_empty() {
            debug!(
                "Dropping {} of {n} row(s) with missing values",
                filter.dropped_rows.len()
            );
        }

        let sub = select(values, &filter.retained_rows, &filter.retained_cols);
        let mut centered = center_columns(sub.view(), config.standardize)?;
        if centered.kept.len() == 1 && !config.standardize {
            centered = center_columns(sub.view(), true)?;
        }
        let constant_columns: Vec<String> = centered
            .constant
            .iter()
            .map(|&k| matrix.columns()[filter.retained_cols[k]].clone())
            .collect();
        if !constant_columns.is_empty() {
            warn!(
                "Dropping {} constant column(s): {}",
                constant_columns.len(),
                constant_columns.join(", ")
            );
        }
        let retained_columns: Vec<String> = centered
            .kept
            .iter()
            .map(|&k| matrix.columns()[filter.retained_cols[k]].clone())
            .collect();

        let (loadings, scores, decomposition) = leading_component(centered.x.view())?;
        let variance_explained = decomposition.variance_explained();
        info!(
            "Aggregated {} column(s) over {} row(s); leading component explains {:.4} of variance",
            retained_columns.len(),
            filter.retained_rows.len(),
            variance_explained
        );

        let diagnostics = AggregateDiagnostics {
            retained_columns,
            dropped_columns,
            constant_columns,
            rows_in: n,
            rows_dropped: filter.dropped_rows.len(),
            rows_used: decomposition.n_samples,
            loadings: loadings.to_vec(),
            leading_singular_value: decomposition.singular_values[0],
            variance_explained,
        };
        Ok((filter.retained_rows, scores.to_vec(), diagnostics))
    }
}

pub fn aggregate(matrix: &ScoreMatrix, config: &AggregateConfig) -> Result<AggregateOutput> {
    ScoreAggregator::new(*config)?.aggregate(matrix)
}

pub fn aggregate_aligned(matrix: &ScoreMatrix, config: &AggregateConfig) -> Result<AlignedOutput> {
    ScoreAggregator::new(*config)?.aggregate_aligned(matrix)
}
