use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::formatter::BracketedFormatter;
use crate::error::{PipelineError, PipelineResult};

/// Map `-v`/`-q` counts to a default filter level.
pub fn level_for(verbose: u8, quiet: u8) -> &'static str {
    match (verbose as i16) - (quiet as i16) {
        i16::MIN..=-2 => "error",
        -1 => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install stdout and file logging. Returns the log file path.
///
/// `RUST_LOG` takes precedence over `default_level`.
pub fn setup_logging(log_dir: &Path, default_level: &str) -> PipelineResult<PathBuf> {
    fs::create_dir_all(log_dir).map_err(|e| PipelineError::io(log_dir, e))?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_path = log_dir.join(format!("lesion_split_{}.log", timestamp));

    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)
        .map_err(|e| PipelineError::io(&log_path, e))?;

    let file_layer = fmt::layer()
        .event_format(BracketedFormatter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false);

    let stdout_layer = fmt::layer()
        .event_format(BracketedFormatter)
        .with_writer(std::io::stdout);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| PipelineError::Config(format!("logging already initialized: {}", e)))?;

    info!("Log file created at: {:?}", log_path);
    Ok(log_path)
}
