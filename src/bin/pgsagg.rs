use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use pgsagg::aggregate::ScoreAggregator;
use pgsagg::batch::{BatchConfig, aggregate_batch, batch_id_column, group_name, load_groups};
use pgsagg::io::{read_table, score_matrix_from_frame, write_dataframe};
use pgsagg::logging::{init_tracing, log_line, open_log, warn_line};
use pgsagg::qc::check_file_exists;
use pgsagg::report::{
    DEFAULT_SCORE_COLUMN, aligned_frame, batch_diagnostics_frame, diagnostics_frame,
    scores_frame, wide_frame,
};
use pgsagg::schema::ScoreTableSpec;
use pgsagg::types::AggregateConfig;

#[derive(Parser)]
#[command(name = "pgsagg")]
#[command(
    about = "Collapse threshold-specific polygenic scores into one leading-component score",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ColumnArgs {
    #[arg(long)]
    id_col: Option<String>,
    #[arg(long)]
    score_cols: Option<String>,
    #[arg(long)]
    score_prefix: Option<String>,
    #[arg(long)]
    exclude: Option<String>,
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, default_value_t = 0.75)]
    min_valid_fraction: f64,
    #[arg(long)]
    no_standardize: bool,
    #[arg(long, default_value_t = 2)]
    min_rows: usize,
}

#[derive(Subcommand)]
enum Command {
    Aggregate {
        #[arg(long, required = true)]
        input: PathBuf,
        #[command(flatten)]
        columns: ColumnArgs,
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long)]
        align: bool,
        #[arg(long, default_value = DEFAULT_SCORE_COLUMN)]
        score_name: String,
        #[arg(long, required = true)]
        output: PathBuf,
        #[arg(long)]
        diagnostics: Option<PathBuf>,
        #[arg(long)]
        log_name: Option<String>,
    },
    Batch {
        #[arg(long, required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        names: Option<String>,
        #[command(flatten)]
        columns: ColumnArgs,
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long)]
        parallel: bool,
        #[arg(long)]
        cores: Option<usize>,
        #[arg(long)]
        strict: bool,
        #[arg(long, required = true)]
        output: PathBuf,
        #[arg(long)]
        diagnostics: Option<PathBuf>,
        #[arg(long)]
        log_name: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Aggregate {
            input,
            columns,
            config,
            align,
            score_name,
            output,
            diagnostics,
            log_name,
        } => {
            check_file_exists(&input, "input")?;
            let spec = table_spec(columns);
            let config = aggregate_config(&config);
            let mut log = open_log(log_name.as_deref(), &group_name(&input))?;
            log_line(
                &mut log,
                &format!("Aggregating scores from {}", input.display()),
                true,
            )?;

            let table = read_table(&input)?;
            let (matrix, selection) =
                score_matrix_from_frame(&table, &spec, &input.display().to_string())?;
            for msg in &selection.info {
                log_line(&mut log, msg, true)?;
            }
            let id_col = selection.id;
            let aggregator = ScoreAggregator::new(config)?;
            let (df, diag) = if align {
                let out = aggregator
                    .aggregate_aligned(&matrix)
                    .with_context(|| format!("aggregate {}", input.display()))?;
                (aligned_frame(&id_col, &score_name, &out)?, out.diagnostics)
            } else {
                let out = aggregator
                    .aggregate(&matrix)
                    .with_context(|| format!("aggregate {}", input.display()))?;
                (scores_frame(&id_col, &score_name, &out)?, out.diagnostics)
            };
            report_diagnostics(&mut log, &group_name(&input), &diag)?;
            write_dataframe(&df, &output)?;
            log_line(
                &mut log,
                &format!("Aggregate scores written to {}", output.display()),
                true,
            )?;
            if let Some(path) = diagnostics {
                write_dataframe(&diagnostics_frame(&group_name(&input), &diag)?, &path)?;
            }
        }
        Command::Batch {
            inputs,
            names,
            columns,
            config,
            parallel,
            cores,
            strict,
            output,
            diagnostics,
            log_name,
        } => {
            let spec = table_spec(columns);
            let names = names.map(split_string_list);
            let batch = BatchConfig {
                aggregate: aggregate_config(&config),
                parallel,
                cores,
                strict,
            };
            let mut log = open_log(log_name.as_deref(), "batch")?;
            log_line(
                &mut log,
                &format!("Aggregation of {} score table(s) started.", inputs.len()),
                true,
            )?;

            let groups = load_groups(&inputs, names.as_deref(), &spec)?;
            let results = aggregate_batch(&groups, &batch)?;
            for r in &results {
                match r.output() {
                    Some(out) => report_diagnostics(&mut log, &r.name, &out.diagnostics)?,
                    None => warn_line(&mut log, &format!("Group {} failed", r.name))?,
                }
            }

            let id_col = batch_id_column(&groups).unwrap_or("IID");
            write_dataframe(&wide_frame(id_col, &results)?, &output)?;
            log_line(
                &mut log,
                &format!("Aggregate scores written to {}", output.display()),
                true,
            )?;
            if let Some(path) = diagnostics {
                write_dataframe(&batch_diagnostics_frame(&results)?, &path)?;
            }
        }
    }

    Ok(())
}

fn report_diagnostics(
    log: &mut File,
    group: &str,
    diag: &pgsagg::types::AggregateDiagnostics,
) -> anyhow::Result<()> {
    if !diag.dropped_columns.is_empty() {
        warn_line(
            log,
            &format!(
                "{group}: dropped low-coverage column(s) {}",
                diag.dropped_columns.join(", ")
            ),
        )?;
    }
    if !diag.constant_columns.is_empty() {
        warn_line(
            log,
            &format!(
                "{group}: dropped constant column(s) {}",
                diag.constant_columns.join(", ")
            ),
        )?;
    }
    log_line(
        log,
        &format!(
            "{group}: {} of {} row(s) used ({} dropped for missingness), variance explained {:.4}",
            diag.rows_used, diag.rows_in, diag.rows_dropped, diag.variance_explained
        ),
        true,
    )
}

fn table_spec(columns: ColumnArgs) -> ScoreTableSpec {
    ScoreTableSpec {
        id_col: columns.id_col,
        score_cols: columns.score_cols.map(split_string_list),
        score_prefix: columns.score_prefix,
        exclude: columns.exclude.map(split_string_list).unwrap_or_default(),
    }
}

fn aggregate_config(args: &ConfigArgs) -> AggregateConfig {
    AggregateConfig {
        min_valid_fraction: args.min_valid_fraction,
        standardize: !args.no_standardize,
        min_rows: args.min_rows,
    }
}

fn split_string_list(input: String) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
