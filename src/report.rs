use std::collections::HashMap;

use anyhow::Result;
use polars::prelude::*;

use crate::batch::{GroupOutcome, GroupResult};
use crate::io::frame_from_series;
use crate::types::{AggregateDiagnostics, AggregateOutput, AlignedOutput};

pub const DEFAULT_SCORE_COLUMN: &str = "AGGREGATE_SCORE";

pub fn scores_frame(id_col: &str, score_col: &str, output: &AggregateOutput) -> Result<DataFrame> {
    let ids: Vec<&str> = output.scores.iter().map(|(k, _)| k.as_str()).collect();
    let values: Vec<f64> = output.scores.iter().map(|(_, v)| *v).collect();
    frame_from_series(vec![
        Series::new(id_col.into(), ids),
        Series::new(score_col.into(), values),
    ])
}

/// Rows dropped by the missingness filter are written as nulls.
pub fn aligned_frame(id_col: &str, score_col: &str, output: &AlignedOutput) -> Result<DataFrame> {
    let values: Vec<Option<f64>> = output
        .scores
        .iter()
        .map(|v| if v.is_nan() { None } else { Some(*v) })
        .collect();
    frame_from_series(vec![
        Series::new(id_col.into(), output.keys.clone()),
        Series::new(score_col.into(), values),
    ])
}

/// Identifier column plus one score column per aggregated group. Keys are
/// listed in first-seen order across groups.
pub fn wide_frame(id_col: &str, results: &[GroupResult]) -> Result<DataFrame> {
    let mut keys: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for out in results.iter().filter_map(|r| r.output()) {
        for (key, _) in &out.scores {
            if !positions.contains_key(key) {
                positions.insert(key.clone(), keys.len());
                keys.push(key.clone());
            }
        }
    }

    let mut series = vec![Series::new(id_col.into(), keys.clone())];
    for r in results {
        let Some(out) = r.output() else {
            continue;
        };
        let mut values: Vec<Option<f64>> = vec![None; keys.len()];
        for (key, v) in &out.scores {
            if let Some(&pos) = positions.get(key) {
                values[pos] = Some(*v);
            }
        }
        series.push(Series::new(r.name.as_str().into(), values));
    }
    frame_from_series(series)
}

struct DiagnosticsRow<'a> {
    group: &'a str,
    status: &'a str,
    message: String,
    diagnostics: Option<&'a AggregateDiagnostics>,
}

fn format_loadings(d: &AggregateDiagnostics) -> String {
    d.retained_columns
        .iter()
        .zip(&d.loadings)
        .map(|(c, l)| format!("{c}={l:.6}"))
        .collect::<Vec<_>>()
        .join(";")
}

fn diag_column<T>(
    rows: &[DiagnosticsRow<'_>],
    f: impl Fn(&AggregateDiagnostics) -> T,
) -> Vec<Option<T>> {
    rows.iter().map(|r| r.diagnostics.map(&f)).collect()
}

fn diagnostics_table(rows: &[DiagnosticsRow<'_>]) -> Result<DataFrame> {
    frame_from_series(vec![
        Series::new(
            "GROUP".into(),
            rows.iter().map(|r| r.group).collect::<Vec<_>>(),
        ),
        Series::new(
            "STATUS".into(),
            rows.iter().map(|r| r.status).collect::<Vec<_>>(),
        ),
        Series::new(
            "MESSAGE".into(),
            rows.iter().map(|r| r.message.clone()).collect::<Vec<_>>(),
        ),
        Series::new("ROWS_IN".into(), diag_column(rows, |d| d.rows_in as u64)),
        Series::new(
            "ROWS_DROPPED".into(),
            diag_column(rows, |d| d.rows_dropped as u64),
        ),
        Series::new("ROWS_USED".into(), diag_column(rows, |d| d.rows_used as u64)),
        Series::new(
            "COLUMNS_USED".into(),
            diag_column(rows, |d| d.retained_columns.len() as u64),
        ),
        Series::new(
            "DROPPED_COLUMNS".into(),
            diag_column(rows, |d| d.dropped_columns.join(";")),
        ),
        Series::new(
            "CONSTANT_COLUMNS".into(),
            diag_column(rows, |d| d.constant_columns.join(";")),
        ),
        Series::new(
            "SINGULAR_VALUE".into(),
            diag_column(rows, |d| d.leading_singular_value),
        ),
        Series::new(
            "VARIANCE_EXPLAINED".into(),
            diag_column(rows, |d| d.variance_explained),
        ),
        Series::new("LOADINGS".into(), diag_column(rows, format_loadings)),
    ])
}

pub fn diagnostics_frame(group: &str, diagnostics: &AggregateDiagnostics) -> Result<DataFrame> {
    diagnostics_table(&[DiagnosticsRow {
        group,
        status: "ok",
        message: String::new(),
        diagnostics: Some(diagnostics),
    }])
}

pub fn batch_diagnostics_frame(results: &[GroupResult]) -> Result<DataFrame> {
    let rows: Vec<DiagnosticsRow<'_>> = results
        .iter()
        .map(|r| match &r.outcome {
            GroupOutcome::Aggregated(out) => DiagnosticsRow {
                group: &r.name,
                status: "ok",
                message: String::new(),
                diagnostics: Some(&out.diagnostics),
            },
            GroupOutcome::Failed(err) => DiagnosticsRow {
                group: &r.name,
                status: "failed",
                message: err.to_string(),
                diagnostics: None,
            },
        })
        .collect();
    diagnostics_table(&rows)
}
