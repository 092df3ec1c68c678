use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::analysis::{SplitRatios, DEFAULT_SEED};
use crate::core::corpus::{FilenameLayout, MetadataColumns};
use crate::core::operations::{StageControl, TransferMode};
use crate::error::{PipelineError, PipelineResult};

const CONFIG_FILE: &str = "config.json";

/// Where [`PipelineConfig::load`] found its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// No file was read; `looked_at` is the default location, if one exists.
    Defaults { looked_at: Option<PathBuf> },
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "loaded from {:?}", path),
            ConfigSource::Defaults { looked_at: Some(path) } => {
                write!(f, "no config file at {:?}, using defaults", path)
            }
            ConfigSource::Defaults { looked_at: None } => {
                write!(f, "could not determine config directory, using defaults")
            }
        }
    }
}

/// Pipeline configuration, loadable from JSON.
///
/// Every field has a default so a config file only needs the values it
/// changes; command-line flags are applied on top afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub metadata_path: PathBuf,
    pub key_column: String,
    pub label_column: String,
    pub images_dir: PathBuf,
    pub organized_dir: PathBuf,
    pub split_dir: PathBuf,
    pub log_dir: PathBuf,
    pub naming: FilenameLayout,
    pub extensions: Vec<String>,
    pub ratios: SplitRatios,
    pub seed: u64,
    pub transfer: TransferMode,
    pub progress_interval: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            metadata_path: PathBuf::from("data/metadata.csv"),
            key_column: "lesion_id".to_string(),
            label_column: "diagnostic".to_string(),
            images_dir: PathBuf::from("data/full_images"),
            organized_dir: PathBuf::from("data/organized_images"),
            split_dir: PathBuf::from("data/split"),
            log_dir: PathBuf::from("logs"),
            naming: FilenameLayout::default(),
            extensions: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
            ratios: SplitRatios::default(),
            seed: DEFAULT_SEED,
            transfer: TransferMode::Copy,
            progress_interval: 100,
        }
    }
}

impl PipelineConfig {
    /// Platform config location, e.g. `~/.config/lesion-split/config.json`.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "lesion-split")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load from `explicit` if given (it must exist and parse), otherwise from
    /// the platform default location if a file is there, otherwise defaults.
    ///
    /// Runs before logging is installed, so the source is returned for the
    /// caller to log.
    pub fn load(explicit: Option<&Path>) -> PipelineResult<(Self, ConfigSource)> {
        if let Some(path) = explicit {
            return Ok((Self::from_file(path)?, ConfigSource::File(path.to_path_buf())));
        }

        match Self::default_config_path() {
            Some(path) if path.is_file() => {
                let config = Self::from_file(&path)?;
                Ok((config, ConfigSource::File(path)))
            }
            looked_at => Ok((Self::default(), ConfigSource::Defaults { looked_at })),
        }
    }

    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("cannot read {:?}: {}", path, e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| PipelineError::Config(format!("cannot parse {:?}: {}", path, e)))
    }

    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("cannot serialize config: {}", e)))?;
        fs::write(path, json).map_err(|e| PipelineError::io(path, e))?;
        info!("Configuration saved to: {:?}", path);
        Ok(())
    }

    /// Checks that need no filesystem access.
    pub fn validate(&self) -> PipelineResult<()> {
        self.ratios.validate()?;
        if self.extensions.is_empty() {
            return Err(PipelineError::Config(
                "at least one image extension is required".to_string(),
            ));
        }
        if self.key_column == self.label_column {
            return Err(PipelineError::Config(format!(
                "key and label columns must differ (both '{}')",
                self.key_column
            )));
        }
        Ok(())
    }

    pub fn columns(&self) -> MetadataColumns {
        MetadataColumns {
            key: self.key_column.clone(),
            label: self.label_column.clone(),
        }
    }

    pub fn stage_control(&self) -> StageControl {
        StageControl::default().with_interval(self.progress_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.ratios, SplitRatios::new(0.7, 0.1, 0.2));
        assert_eq!(config.transfer, TransferMode::Copy);
        assert_eq!(config.naming.identifier_index, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        fs::write(
            &path,
            r#"{ "seed": 7, "transfer": "move", "ratios": { "train": 0.8, "validation": 0.1, "test": 0.1 } }"#,
        )
        .unwrap();

        let (config, source) = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(source, ConfigSource::File(path.clone()));
        assert_eq!(config.seed, 7);
        assert_eq!(config.transfer, TransferMode::Move);
        assert_eq!(config.ratios.train, 0.8);
        assert_eq!(config.key_column, "lesion_id");
    }

    #[test]
    fn test_explicit_missing_or_malformed_file_is_error() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("absent.json");
        assert!(matches!(
            PipelineConfig::load(Some(&missing)),
            Err(PipelineError::Config(_))
        ));

        let bad = temp.path().join("bad.json");
        fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(
            PipelineConfig::load(Some(&bad)),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_save_then_load() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("config.json");
        let config = PipelineConfig {
            seed: 123,
            ..PipelineConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(PipelineConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_config_source_describes_fallback() {
        let source = ConfigSource::Defaults {
            looked_at: Some(PathBuf::from("/etc/lesion-split/config.json")),
        };
        assert!(source.to_string().contains("using defaults"));
        assert!(source.to_string().contains("/etc/lesion-split/config.json"));
    }

    #[test]
    fn test_validate_rejects_bad_ratios() {
        let config = PipelineConfig {
            ratios: SplitRatios::new(0.6, 0.1, 0.1),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidRatios { .. })
        ));
    }
}
