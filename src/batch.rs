use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::aggregate::ScoreAggregator;
use crate::error::AggregateError;
use crate::io::read_score_table;
use crate::parallel::{resolve_threads, run_in_pool};
use crate::qc::{check_equal_length, check_file_exists};
use crate::schema::ScoreTableSpec;
use crate::types::{AggregateConfig, AggregateOutput, ScoreMatrix};

/// One entity-group, e.g. the threshold scores of a single metabolite.
#[derive(Debug, Clone)]
pub struct ScoreGroup {
    pub name: String,
    /// Identifier column the keys were read from.
    pub id_column: String,
    pub matrix: ScoreMatrix,
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub aggregate: AggregateConfig,
    pub parallel: bool,
    pub cores: Option<usize>,
    /// Abort on the first failing group instead of recording it.
    pub strict: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            aggregate: AggregateConfig::default(),
            parallel: false,
            cores: None,
            strict: false,
        }
    }
}

#[derive(Debug)]
pub enum GroupOutcome {
    Aggregated(AggregateOutput),
    Failed(AggregateError),
}

#[derive(Debug)]
pub struct GroupResult {
    pub index: usize,
    pub name: String,
    pub outcome: GroupOutcome,
}

impl GroupResult {
    pub fn output(&self) -> Option<&AggregateOutput> {
        match &self.outcome {
            GroupOutcome::Aggregated(out) => Some(out),
            GroupOutcome::Failed(_) => None,
        }
    }
}

/// Aggregates every group independently. Results come back in input order.
pub fn aggregate_batch(groups: &[ScoreGroup], config: &BatchConfig) -> Result<Vec<GroupResult>> {
    let aggregator = ScoreAggregator::new(config.aggregate)?;

    let run_group = |idx: usize| {
        let group = &groups[idx];
        GroupResult {
            index: idx,
            name: group.name.clone(),
            outcome: match aggregator.aggregate(&group.matrix) {
                Ok(out) => GroupOutcome::Aggregated(out),
                Err(err) => GroupOutcome::Failed(err),
            },
        }
    };

    let mut results = if config.parallel {
        let run = || {
            (0..groups.len())
                .into_par_iter()
                .map(run_group)
                .collect::<Vec<GroupResult>>()
        };
        let threads = resolve_threads(config.cores, groups.len());
        let mut out = run_in_pool(threads, "build aggregation thread pool", run)?;
        out.sort_by_key(|r| r.index);
        out
    } else {
        (0..groups.len()).map(run_group).collect::<Vec<_>>()
    };

    let failed = results
        .iter()
        .filter(|r| matches!(r.outcome, GroupOutcome::Failed(_)))
        .count();
    if config.strict
        && let Some(pos) = results
            .iter()
            .position(|r| matches!(r.outcome, GroupOutcome::Failed(_)))
    {
        let result = results.swap_remove(pos);
        if let GroupOutcome::Failed(err) = result.outcome {
            return Err(anyhow::Error::new(err).context(format!("aggregate group {}", result.name)));
        }
    }
    for r in &results {
        if let GroupOutcome::Failed(err) = &r.outcome {
            warn!("Group {} was not aggregated: {err}", r.name);
        }
    }
    info!(
        "Aggregated {} of {} group(s)",
        results.len() - failed,
        results.len()
    );
    Ok(results)
}

/// Group name from a file path: the file name without `.gz`/`.bz2` and the table extension.
pub fn group_name(path: &std::path::Path) -> String {
    let mut name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("group")
        .to_string();
    for ext in [".gz", ".bz2"] {
        if let Some(stripped) = name.strip_suffix(ext) {
            name = stripped.to_string();
        }
    }
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}

pub fn load_groups(
    paths: &[PathBuf],
    names: Option<&[String]>,
    spec: &ScoreTableSpec,
) -> Result<Vec<ScoreGroup>> {
    if let Some(names) = names {
        check_equal_length(paths.len(), names.len(), "inputs", "names")?;
    }
    let mut groups = Vec::with_capacity(paths.len());
    for (idx, path) in paths.iter().enumerate() {
        check_file_exists(path, "inputs")?;
        let name = names
            .and_then(|n| n.get(idx))
            .cloned()
            .unwrap_or_else(|| group_name(path));
        let (matrix, selection) = read_score_table(path, spec)
            .with_context(|| format!("load score table for group {name}"))?;
        groups.push(ScoreGroup {
            name,
            id_column: selection.id,
            matrix,
        });
    }
    check_group_names(&groups)?;
    Ok(groups)
}

/// Group names become column names of the wide table, next to the identifier column.
fn check_group_names(groups: &[ScoreGroup]) -> Result<()> {
    let mut seen = HashSet::new();
    for group in groups {
        if !seen.insert(group.name.as_str()) {
            return Err(AggregateError::InvalidArgument(format!(
                "group name {} is used more than once; pass distinct --names",
                group.name
            ))
            .into());
        }
    }
    if let Some(group) = groups
        .iter()
        .find(|g| groups.iter().any(|other| other.id_column == g.name))
    {
        return Err(AggregateError::InvalidArgument(format!(
            "group name {} clashes with the identifier column",
            group.name
        ))
        .into());
    }
    Ok(())
}

/// Identifier column for the wide table: the first group's, warning when groups disagree.
pub fn batch_id_column(groups: &[ScoreGroup]) -> Option<&str> {
    let first = groups.first()?;
    for group in &groups[1..] {
        if group.id_column != first.id_column {
            warn!(
                "Group {} reads identifiers from {}, writing them under {}",
                group.name, group.id_column, first.id_column
            );
        }
    }
    Some(first.id_column.as_str())
}
