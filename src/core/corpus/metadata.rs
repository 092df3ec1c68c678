use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use super::identifier::ItemId;
use crate::error::{PipelineError, PipelineResult};

/// Diagnostic category of an item, verbatim from the metadata file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(pub String);

impl Label {
    pub fn new(value: impl Into<String>) -> Self {
        Label(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Column names to read from the metadata table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataColumns {
    pub key: String,
    pub label: String,
}

impl Default for MetadataColumns {
    fn default() -> Self {
        Self {
            key: "lesion_id".to_string(),
            label: "diagnostic".to_string(),
        }
    }
}

const PATIENT_COLUMN: &str = "patient_id";

/// Identifier to label mapping plus the distinct label set.
#[derive(Debug, Clone, Default)]
pub struct LabelMapping {
    by_id: HashMap<ItemId, Label>,
    labels: BTreeSet<Label>,
    rows: usize,
    conflicting_keys: usize,
}

impl LabelMapping {
    /// Load the mapping from a CSV file with a header row.
    pub fn load(path: &Path, columns: &MetadataColumns) -> PipelineResult<Self> {
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        let mapping = Self::from_reader(file, path, columns)?;
        info!(
            "Loaded {} metadata rows from {:?}: {} distinct keys, {} distinct labels",
            mapping.rows,
            path,
            mapping.len(),
            mapping.labels.len()
        );
        Ok(mapping)
    }

    /// Parse CSV from any reader. `origin` is only used in error messages.
    pub fn from_reader<R: Read>(
        reader: R,
        origin: &Path,
        columns: &MetadataColumns,
    ) -> PipelineResult<Self> {
        let malformed = |reason: String| PipelineError::MalformedMetadata {
            path: origin.to_path_buf(),
            reason,
        };

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| malformed(format!("unreadable header: {}", e)))?
            .clone();
        let column_index = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| malformed(format!("required column '{}' is absent", name)))
        };
        let key_idx = column_index(&columns.key)?;
        let label_idx = column_index(&columns.label)?;
        let patient_idx = headers.iter().position(|h| h == PATIENT_COLUMN);

        let mut mapping = LabelMapping::default();
        let mut patients: HashSet<String> = HashSet::new();

        for (row, record) in csv_reader.records().enumerate() {
            // +2: one for the header, one for 1-based numbering
            let line = row + 2;
            let record = record.map_err(|e| malformed(format!("row {}: {}", line, e)))?;

            let key_cell = record.get(key_idx).unwrap_or("");
            let key = key_cell.parse::<u64>().map(ItemId).map_err(|_| {
                malformed(format!(
                    "row {}: key '{}' in column '{}' is not an integer",
                    line, key_cell, columns.key
                ))
            })?;

            let label_cell = record.get(label_idx).unwrap_or("");
            if label_cell.is_empty() {
                return Err(malformed(format!(
                    "row {}: empty label in column '{}'",
                    line, columns.label
                )));
            }
            let label = Label::new(label_cell);

            if let Some(p) = patient_idx.and_then(|idx| record.get(idx)) {
                patients.insert(p.to_string());
            }

            mapping.insert(key, label);
            mapping.rows += 1;
        }

        if patient_idx.is_some() {
            info!("Unique {} values: {}", PATIENT_COLUMN, patients.len());
        }
        if mapping.conflicting_keys > 0 {
            warn!(
                "{} metadata keys appeared with more than one label; the last row wins",
                mapping.conflicting_keys
            );
        }

        Ok(mapping)
    }

    fn insert(&mut self, key: ItemId, label: Label) {
        if let Some(previous) = self.by_id.get(&key) {
            if *previous != label {
                warn!(
                    "Key {} relabeled from '{}' to '{}'",
                    key, previous, label
                );
                self.conflicting_keys += 1;
            }
        }
        self.labels.insert(label.clone());
        self.by_id.insert(key, label);
    }

    pub fn get(&self, id: ItemId) -> Option<&Label> {
        self.by_id.get(&id)
    }

    pub fn labels(&self) -> &BTreeSet<Label> {
        &self.labels
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn conflicting_keys(&self) -> usize {
        self.conflicting_keys
    }
}

impl FromIterator<(ItemId, Label)> for LabelMapping {
    fn from_iter<I: IntoIterator<Item = (ItemId, Label)>>(iter: I) -> Self {
        let mut mapping = LabelMapping::default();
        for (key, label) in iter {
            mapping.insert(key, label);
            mapping.rows += 1;
        }
        mapping
    }
}
