use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn log_path(log_name: Option<&str>, default: &str) -> PathBuf {
    let mut name = log_name.unwrap_or(default).replace('/', "");
    if name.chars().count() > 200 {
        name = name.chars().take(100).collect();
    }
    if name.is_empty() {
        name = default.to_string();
    }
    PathBuf::from(format!("{name}_pgsagg.log"))
}

pub fn open_log(log_name: Option<&str>, default: &str) -> Result<File> {
    let path = log_path(log_name, default);
    File::create(&path).with_context(|| format!("create log file {}", path.display()))
}

pub fn log_line(log: &mut File, message: &str, print: bool) -> Result<()> {
    if print {
        info!("{message}");
    }
    writeln!(log, "{message}")?;
    Ok(())
}

pub fn warn_line(log: &mut File, message: &str) -> Result<()> {
    warn!("{message}");
    writeln!(log, "{message}")?;
    Ok(())
}
