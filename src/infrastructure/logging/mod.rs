//! Logging for the pipeline
//!
//! - Bracketed line format with the active stage span
//! - Dual output (log file + stdout)
//! - Timestamped log file per run

mod formatter;
mod setup;

pub use formatter::BracketedFormatter;
pub use setup::{level_for, setup_logging};
