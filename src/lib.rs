//! Organize a labeled dermatoscopic image corpus into per-label directories
//! and split it into seeded, stratified train/validation/test partitions.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infrastructure;
pub mod pipeline;

pub use error::{PipelineError, PipelineResult};
