use std::path::Path;

use crate::error::{AggregateError, Result};
use crate::types::AggregateConfig;

pub fn check_equal_length(
    left_len: usize,
    right_len: usize,
    left_name: &str,
    right_name: &str,
) -> Result<()> {
    if left_len != right_len {
        return Err(AggregateError::InvalidArgument(format!(
            "Length of {left_name} and {right_name} should be equal"
        )));
    }
    Ok(())
}

/// Closed-interval check; `value` must also be finite.
pub fn check_range_f64(value: f64, min: f64, max: f64, name: &str) -> Result<()> {
    if !value.is_finite() {
        return Err(AggregateError::InvalidArgument(format!(
            "Value of {name} should be finite"
        )));
    }
    if value < min {
        return Err(AggregateError::InvalidArgument(format!(
            "Value of {name} should be at least {min}"
        )));
    }
    if value > max {
        return Err(AggregateError::InvalidArgument(format!(
            "Value of {name} should be at most {max}"
        )));
    }
    Ok(())
}

pub fn check_file_exists(path: &Path, name: &str) -> Result<()> {
    if !path.exists() {
        return Err(AggregateError::InvalidArgument(format!(
            "File {path:?} passed to {name} does not exist"
        )));
    }
    Ok(())
}

pub fn check_config(config: &AggregateConfig) -> Result<()> {
    check_range_f64(config.min_valid_fraction, 0.0, 1.0, "min_valid_fraction")?;
    if config.min_rows < 2 {
        return Err(AggregateError::InvalidArgument(format!(
            "Value of min_rows should be at least 2, got {}",
            config.min_rows
        )));
    }
    Ok(())
}
