use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Fatal errors. Any of these stops the pipeline at the stage that raised it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid split ratios (train {train}, validation {validation}, test {test}): {reason}")]
    InvalidRatios {
        train: f64,
        validation: f64,
        test: f64,
        reason: String,
    },
    #[error("source directory {0:?} does not exist or is not a directory")]
    MissingSourceDirectory(PathBuf),
    #[error("labels '{first}' and '{second}' both sanitize to directory name '{dirname}'")]
    DirectoryCollision {
        first: String,
        second: String,
        dirname: String,
    },
    #[error("label '{0}' sanitizes to an empty directory name")]
    EmptyDirectoryName(String),
    #[error("malformed metadata in {path:?}: {reason}")]
    MalformedMetadata { path: PathBuf, reason: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error category.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::InvalidRatios { .. } => 2,
            PipelineError::MissingSourceDirectory(_) => 3,
            PipelineError::DirectoryCollision { .. } | PipelineError::EmptyDirectoryName(_) => 4,
            PipelineError::MalformedMetadata { .. } => 5,
            PipelineError::Config(_) => 6,
            PipelineError::Io { .. } => 7,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::InvalidRatios { .. } => "invalid_ratios",
            PipelineError::MissingSourceDirectory(_) => "missing_source_directory",
            PipelineError::DirectoryCollision { .. } => "directory_collision",
            PipelineError::EmptyDirectoryName(_) => "empty_directory_name",
            PipelineError::MalformedMetadata { .. } => "malformed_metadata",
            PipelineError::Config(_) => "config",
            PipelineError::Io { .. } => "io",
        }
    }
}
