use std::collections::HashSet;

use crate::error::{AggregateError, Result};

const ID_SYNONYMS: &[&str] = &[
    "IID",
    "ID",
    "EID",
    "SAMPLE",
    "SAMPLE_ID",
    "SAMPLEID",
    "SUBJECT",
    "INDIVIDUAL",
];

/// Bookkeeping columns emitted by PLINK `--score` and PRSice next to the scores.
const NON_SCORE_COLUMNS: &[&str] = &["FID", "PHENO", "SEX", "CNT", "CNT2", "IN_REGRESSION"];

/// How to find the identifier and score columns of a loaded table.
#[derive(Debug, Clone, Default)]
pub struct ScoreTableSpec {
    pub id_col: Option<String>,
    pub score_cols: Option<Vec<String>>,
    pub score_prefix: Option<String>,
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ColumnSelection {
    pub id: String,
    pub scores: Vec<String>,
    pub info: Vec<String>,
}

fn find_header<'a>(headers: &'a [String], name: &str) -> Option<&'a String> {
    headers.iter().find(|h| h.trim().eq_ignore_ascii_case(name))
}

pub fn resolve_columns(
    headers: &[String],
    spec: &ScoreTableSpec,
    filename: &str,
) -> Result<ColumnSelection> {
    let mut info = Vec::new();

    let id = match &spec.id_col {
        Some(name) => find_header(headers, name)
            .cloned()
            .ok_or_else(|| AggregateError::MissingColumn(format!("{name} in {filename}")))?,
        None => {
            let found = ID_SYNONYMS
                .iter()
                .find_map(|syn| find_header(headers, syn))
                .cloned()
                .ok_or_else(|| {
                    AggregateError::MissingColumn(format!(
                        "identifier column in {filename}; pass it explicitly"
                    ))
                })?;
            info.push(format!(
                "Interpreting the {found} column as the identifier column."
            ));
            found
        }
    };

    let excluded: HashSet<String> = spec
        .exclude
        .iter()
        .map(|c| c.trim().to_ascii_uppercase())
        .collect();

    let scores: Vec<String> = if let Some(cols) = &spec.score_cols {
        let mut out = Vec::with_capacity(cols.len());
        for col in cols {
            let header = find_header(headers, col)
                .ok_or_else(|| AggregateError::MissingColumn(format!("{col} in {filename}")))?;
            out.push(header.clone());
        }
        out
    } else if let Some(prefix) = &spec.score_prefix {
        let prefix = prefix.to_ascii_uppercase();
        let out: Vec<String> = headers
            .iter()
            .filter(|h| *h != &id)
            .filter(|h| h.trim().to_ascii_uppercase().starts_with(&prefix))
            .filter(|h| !excluded.contains(&h.trim().to_ascii_uppercase()))
            .cloned()
            .collect();
        info.push(format!(
            "Selected {} score column(s) with prefix {prefix}.",
            out.len()
        ));
        out
    } else {
        let out: Vec<String> = headers
            .iter()
            .filter(|h| *h != &id)
            .filter(|h| {
                let upper = h.trim().to_ascii_uppercase();
                !NON_SCORE_COLUMNS.contains(&upper.as_str()) && !excluded.contains(&upper)
            })
            .cloned()
            .collect();
        info.push(format!(
            "Using every remaining column as a score column ({}).",
            out.len()
        ));
        out
    };

    if scores.iter().any(|s| s == &id) {
        return Err(AggregateError::InvalidArgument(format!(
            "identifier column {id} cannot also be a score column"
        )));
    }
    if scores.is_empty() {
        return Err(AggregateError::MissingColumn(format!(
            "no score columns selected in {filename}"
        )));
    }

    Ok(ColumnSelection { id, scores, info })
}
