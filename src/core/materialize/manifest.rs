use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::split::LabelSplit;
use crate::core::analysis::SplitRatios;
use crate::core::dataset::Partition;
use crate::core::operations::file_name_of;
use crate::error::{PipelineError, PipelineResult};

pub const MANIFEST_FILE: &str = "split_manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestLabel {
    pub label: String,
    pub dirname: String,
    pub train: Vec<String>,
    pub validation: Vec<String>,
    pub test: Vec<String>,
}

impl ManifestLabel {
    pub fn files(&self, partition: Partition) -> &[String] {
        match partition {
            Partition::Train => &self.train,
            Partition::Validation => &self.validation,
            Partition::Test => &self.test,
        }
    }
}

/// File names assigned to each partition, per label, for a given seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitManifest {
    pub seed: u64,
    pub ratios: SplitRatios,
    pub labels: Vec<ManifestLabel>,
}

impl SplitManifest {
    pub fn from_splits(splits: &[LabelSplit], ratios: &SplitRatios, seed: u64) -> Self {
        let names = |partition: Partition, split: &LabelSplit| -> Vec<String> {
            split
                .assignment
                .get(partition)
                .iter()
                .map(|p| file_name_of(p))
                .collect()
        };
        let labels = splits
            .iter()
            .map(|s| ManifestLabel {
                label: s.label.to_string(),
                dirname: s.dirname.clone(),
                train: names(Partition::Train, s),
                validation: names(Partition::Validation, s),
                test: names(Partition::Test, s),
            })
            .collect();
        Self {
            seed,
            ratios: *ratios,
            labels,
        }
    }

    pub fn save(&self, dir: &Path) -> PipelineResult<PathBuf> {
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("cannot serialize manifest: {}", e)))?;
        fs::write(&path, json).map_err(|e| PipelineError::io(&path, e))?;
        info!("Split manifest saved to {:?}", path);
        Ok(path)
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::from_str(&contents)
            .map_err(|e| PipelineError::Config(format!("cannot parse manifest {:?}: {}", path, e)))
    }
}
