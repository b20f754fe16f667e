use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use polars::prelude::*;
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::AggregateError;
use crate::matrix::from_columns;
use crate::schema::{ColumnSelection, ScoreTableSpec, resolve_columns};
use crate::types::ScoreMatrix;

pub fn read_table(path: &Path) -> Result<DataFrame> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    if ext == "gz" || ext == "bz2" {
        let tmp = decompress_to_temp(path, &ext)?;
        return read_table_plain(tmp.path());
    }

    read_table_plain(path)
}

/// Every column is read as text; score columns are cast when the matrix is
/// built, so identifiers keep leading zeros and mixed tokens.
fn read_table_plain(path: &Path) -> Result<DataFrame> {
    let delimiter = detect_delimiter(path)?;
    if delimiter == b' ' {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        return read_table_whitespace(BufReader::new(file));
    }

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(delimiter)
                .with_null_values(Some(NullValues::AllColumns(vec![
                    "".into(),
                    "NA".into(),
                    "NaN".into(),
                    ".".into(),
                ])))
                .with_missing_is_null(true),
        )
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("read {}", path.display()))
}

/// PLINK `.profile` and PRSice outputs are padded with runs of spaces.
fn read_table_whitespace<R: Read>(reader: R) -> Result<DataFrame> {
    let mut reader = BufReader::new(reader);
    let mut header_line = String::new();
    reader.read_line(&mut header_line)?;
    if header_line.trim().is_empty() {
        return Err(anyhow::anyhow!("empty file"));
    }
    let headers: Vec<&str> = header_line.split_whitespace().collect();
    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        for (i, col) in columns.iter_mut().enumerate() {
            col.push(parts.get(i).and_then(|v| normalize_missing_token(v)));
        }
    }

    let series: Vec<Series> = headers
        .iter()
        .zip(columns)
        .map(|(name, values)| Series::new((*name).into(), values))
        .collect();
    frame_from_series(series)
}

fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut first = String::new();
    reader.read_line(&mut first)?;
    if first.contains('\t') {
        return Ok(b'\t');
    }
    if first.contains(',') {
        return Ok(b',');
    }
    Ok(b' ')
}

fn decompress_to_temp(path: &Path, ext: &str) -> Result<NamedTempFile> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut decoder: Box<dyn Read> = match ext {
        "gz" => Box::new(GzDecoder::new(file)),
        "bz2" => Box::new(BzDecoder::new(file)),
        _ => Box::new(file),
    };
    let mut tmp = NamedTempFile::new()?;
    std::io::copy(&mut decoder, &mut tmp)?;
    Ok(tmp)
}

fn normalize_missing_token(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "." {
        return None;
    }
    let upper = trimmed.to_ascii_uppercase();
    if upper == "NA" || upper == "NAN" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn frame_from_series(series: Vec<Series>) -> Result<DataFrame> {
    let mut iter = series.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| anyhow::anyhow!("cannot build a table without columns"))?;
    let mut df = first.into_frame();
    for s in iter {
        if df.get_column_index(s.name().as_str()).is_some() {
            return Err(AggregateError::InvalidArgument(format!(
                "duplicate output column {}",
                s.name()
            ))
            .into());
        }
        df.with_column(Column::from(s))?;
    }
    Ok(df)
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df
        .column(name)?
        .as_series()
        .context("series")?
        .cast(&DataType::Float64)?;
    let col = series.f64()?;
    Ok(col.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

fn key_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = df
        .column(name)?
        .as_series()
        .context("series")?
        .cast(&DataType::String)?;
    let col = series.str()?;
    col.into_iter()
        .enumerate()
        .map(|(i, v)| match v {
            Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            _ => Err(anyhow::anyhow!("missing identifier in {name} at row {}", i + 1)),
        })
        .collect()
}

pub fn score_matrix_from_frame(
    df: &DataFrame,
    spec: &ScoreTableSpec,
    filename: &str,
) -> Result<(ScoreMatrix, ColumnSelection)> {
    let headers: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let selection = resolve_columns(&headers, spec, filename)?;
    let keys = key_column(df, &selection.id)?;
    let columns = selection
        .scores
        .iter()
        .map(|name| float_column(df, name))
        .collect::<Result<Vec<_>>>()?;
    let values = if columns.is_empty() {
        ndarray::Array2::zeros((keys.len(), 0))
    } else {
        from_columns(&columns)?
    };
    let matrix = ScoreMatrix::new(keys, selection.scores.clone(), values)
        .with_context(|| format!("build score matrix from {filename}"))?;
    Ok((matrix, selection))
}

pub fn read_score_matrix(path: &Path, spec: &ScoreTableSpec) -> Result<ScoreMatrix> {
    read_score_table(path, spec).map(|(matrix, _)| matrix)
}

/// Like [`read_score_matrix`], also returning the resolved column selection.
pub fn read_score_table(
    path: &Path,
    spec: &ScoreTableSpec,
) -> Result<(ScoreMatrix, ColumnSelection)> {
    let df = read_table(path)?;
    let filename = path.display().to_string();
    let (matrix, selection) = score_matrix_from_frame(&df, spec, &filename)?;
    for msg in &selection.info {
        info!("{msg}");
    }
    info!(
        "Read {} row(s) and {} score column(s) from {filename}",
        matrix.nrows(),
        matrix.ncols()
    );
    Ok((matrix, selection))
}

pub fn write_dataframe(df: &DataFrame, path: &Path) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut csv = CsvWriter::new(&mut file).with_separator(b'\t');
    let mut df = df.clone();
    csv.finish(&mut df)?;
    Ok(())
}

/// Recovers the typed error behind an `anyhow` chain, if there is one.
pub fn aggregate_error(err: &anyhow::Error) -> Option<&AggregateError> {
    err.chain().find_map(|e| e.downcast_ref::<AggregateError>())
}
