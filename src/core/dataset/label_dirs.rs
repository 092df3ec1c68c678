//! Label to directory-name mapping and the on-disk layouts built from it.
//!
//! The layout types can only be obtained from the builders below, which
//! create every directory first. Materialization takes a layout, so it can
//! never run against a directory tree that has not been prepared.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::Partition;
use crate::core::corpus::Label;
use crate::error::{PipelineError, PipelineResult};

/// Derive a directory name from a label.
///
/// Keeps ASCII letters, digits, `_`, `-` and whitespace; drops everything
/// else, trims, then turns each remaining whitespace char into `_`.
pub fn sanitize_label(label: &str) -> String {
    let kept: String = label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    kept.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Injective label to directory-name mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelDirectories {
    to_dir: BTreeMap<Label, String>,
    to_label: HashMap<String, Label>,
}

impl LabelDirectories {
    /// Compute directory names without touching the filesystem.
    pub fn plan<'a, I>(labels: I) -> PipelineResult<Self>
    where
        I: IntoIterator<Item = &'a Label>,
    {
        let mut dirs = LabelDirectories::default();
        let unique: BTreeSet<&Label> = labels.into_iter().collect();

        for label in unique {
            let dirname = sanitize_label(label.as_str());
            if dirname.is_empty() {
                return Err(PipelineError::EmptyDirectoryName(label.to_string()));
            }
            if let Some(existing) = dirs.to_label.get(&dirname) {
                return Err(PipelineError::DirectoryCollision {
                    first: existing.to_string(),
                    second: label.to_string(),
                    dirname,
                });
            }
            dirs.to_label.insert(dirname.clone(), label.clone());
            dirs.to_dir.insert(label.clone(), dirname);
        }

        Ok(dirs)
    }

    pub fn dirname(&self, label: &Label) -> Option<&str> {
        self.to_dir.get(label).map(String::as_str)
    }

    /// Reverse lookup: the label a directory stands for.
    pub fn label_for_dir(&self, dirname: &str) -> Option<&Label> {
        self.to_label.get(dirname)
    }

    /// `(label, dirname)` pairs in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&Label, &str)> {
        self.to_dir.iter().map(|(l, d)| (l, d.as_str()))
    }

    pub fn len(&self) -> usize {
        self.to_dir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_dir.is_empty()
    }
}

fn ensure_dir(path: &Path) -> PipelineResult<()> {
    fs::create_dir_all(path).map_err(|e| PipelineError::io(path, e))?;
    debug!("Ensured directory {:?}", path);
    Ok(())
}

/// `root/<dirname>/` for every label.
#[derive(Debug, Clone)]
pub struct OrganizedLayout {
    root: PathBuf,
    dirs: LabelDirectories,
}

impl OrganizedLayout {
    /// Sanitize every label and create its directory under `root`.
    /// Existing directories are kept as they are.
    pub fn build<'a, I>(root: &Path, labels: I) -> PipelineResult<Self>
    where
        I: IntoIterator<Item = &'a Label>,
    {
        let dirs = LabelDirectories::plan(labels)?;
        Self::create(root, dirs)
    }

    pub fn create(root: &Path, dirs: LabelDirectories) -> PipelineResult<Self> {
        ensure_dir(root)?;
        for (_, dirname) in dirs.iter() {
            ensure_dir(&root.join(dirname))?;
        }
        info!("Prepared {} label directories under {:?}", dirs.len(), root);
        Ok(Self {
            root: root.to_path_buf(),
            dirs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn directories(&self) -> &LabelDirectories {
        &self.dirs
    }

    pub fn label_dir(&self, label: &Label) -> Option<PathBuf> {
        self.dirs.dirname(label).map(|d| self.root.join(d))
    }
}

/// `root/<partition>/<dirname>/` for every partition and label.
#[derive(Debug, Clone)]
pub struct SplitLayout {
    root: PathBuf,
    dirs: LabelDirectories,
}

impl SplitLayout {
    pub fn create(root: &Path, dirs: LabelDirectories) -> PipelineResult<Self> {
        for partition in Partition::ALL {
            let partition_root = root.join(partition.as_str());
            ensure_dir(&partition_root)?;
            for (_, dirname) in dirs.iter() {
                ensure_dir(&partition_root.join(dirname))?;
            }
        }
        info!(
            "Prepared split directory structure for {} labels under {:?}",
            dirs.len(),
            root
        );
        Ok(Self {
            root: root.to_path_buf(),
            dirs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn directories(&self) -> &LabelDirectories {
        &self.dirs
    }

    pub fn label_dir(&self, partition: Partition, label: &Label) -> Option<PathBuf> {
        self.dirs
            .dirname(label)
            .map(|d| self.root.join(partition.as_str()).join(d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn labels(values: &[&str]) -> Vec<Label> {
        values.iter().map(|v| Label::new(*v)).collect()
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("BCC"), "BCC");
        assert_eq!(sanitize_label("  basal cell carcinoma "), "basal_cell_carcinoma");
        assert_eq!(sanitize_label("nevus/mole (benign)"), "nevusmole_benign");
        assert_eq!(sanitize_label("seb-keratosis_2"), "seb-keratosis_2");
        assert_eq!(sanitize_label("café"), "caf");
    }

    #[test]
    fn test_distinct_labels_never_collide() {
        let all = labels(&["ACK", "BCC", "MEL", "NEV", "SCC", "SEK"]);
        let dirs = LabelDirectories::plan(&all).unwrap();
        assert_eq!(dirs.len(), 6);
        for label in &all {
            let dirname = dirs.dirname(label).unwrap();
            assert_eq!(dirs.label_for_dir(dirname), Some(label));
        }
    }

    #[test]
    fn test_collision_is_fatal() {
        let all = labels(&["a b", "a_b"]);
        let err = LabelDirectories::plan(&all).unwrap_err();
        match err {
            PipelineError::DirectoryCollision { dirname, .. } => assert_eq!(dirname, "a_b"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_dirname_is_fatal() {
        let all = labels(&["???"]);
        assert!(matches!(
            LabelDirectories::plan(&all),
            Err(PipelineError::EmptyDirectoryName(_))
        ));
    }

    #[test]
    fn test_collision_creates_nothing() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("organized");
        let all = labels(&["x.y", "xy"]);
        assert!(OrganizedLayout::build(&root, &all).is_err());
        assert!(!root.exists());
    }

    #[test]
    fn test_build_is_idempotent_and_keeps_contents() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("organized");
        let all = labels(&["MEL", "NEV"]);

        let layout = OrganizedLayout::build(&root, &all).unwrap();
        let kept = layout.label_dir(&Label::new("MEL")).unwrap().join("PAT_1_2_3.png");
        fs::write(&kept, b"x").unwrap();

        let again = OrganizedLayout::build(&root, &all).unwrap();
        assert!(kept.exists());
        assert_eq!(again.directories(), layout.directories());
    }

    #[test]
    fn test_split_layout_creates_partition_label_dirs() {
        let temp = tempdir().unwrap();
        let dirs = LabelDirectories::plan(&labels(&["BCC", "SCC"])).unwrap();
        let layout = SplitLayout::create(temp.path(), dirs).unwrap();
        for partition in Partition::ALL {
            for label in ["BCC", "SCC"] {
                assert!(layout.label_dir(partition, &Label::new(label)).unwrap().is_dir());
            }
        }
    }
}
