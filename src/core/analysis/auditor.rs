//! Read-only check that every materialized image sits under the directory of
//! the label its key maps to. Misplacements are reported, never repaired.

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, info_span, warn};

use crate::core::corpus::{
    list_item_files, list_subdirectories, parse_path_identifier, FilenameLayout, ItemId, Label,
    LabelMapping, ParseError,
};
use crate::core::dataset::{LabelDirectories, Partition};
use crate::core::operations::{Stage, StageControl};
use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    Correct,
    /// The file belongs to `expected`, not the directory it sits in.
    Incorrect { expected: Label },
    MissingMapping(ItemId),
    UnparsableIdentifier(ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFinding {
    pub path: PathBuf,
    pub partition: Option<Partition>,
    /// Label implied by the directory the file was found in.
    pub found_label: Label,
    pub outcome: AuditOutcome,
}

/// One `<root>[/<partition>]/<dirname>/` directory to audit.
#[derive(Debug, Clone)]
pub struct AuditTarget {
    pub partition: Option<Partition>,
    pub label: Label,
    pub dirname: String,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditCounts {
    pub total: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub missing_mapping: usize,
    pub unparsable: usize,
}

impl AuditCounts {
    /// Files that could not be checked at all.
    pub fn errors(&self) -> usize {
        self.missing_mapping + self.unparsable
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub findings: Vec<AuditFinding>,
    /// Directories under an audited root that match no known label.
    pub unknown_directories: Vec<PathBuf>,
    /// The audit stopped before checking every file.
    pub cancelled: bool,
}

impl AuditReport {
    pub fn counts(&self) -> AuditCounts {
        let mut counts = AuditCounts {
            total: self.findings.len(),
            ..AuditCounts::default()
        };
        for finding in &self.findings {
            match finding.outcome {
                AuditOutcome::Correct => counts.correct += 1,
                AuditOutcome::Incorrect { .. } => counts.incorrect += 1,
                AuditOutcome::MissingMapping(_) => counts.missing_mapping += 1,
                AuditOutcome::UnparsableIdentifier(_) => counts.unparsable += 1,
            }
        }
        counts
    }

    pub fn misplaced(&self) -> impl Iterator<Item = &AuditFinding> {
        self.findings
            .iter()
            .filter(|f| matches!(f.outcome, AuditOutcome::Incorrect { .. }))
    }

    pub fn merge(&mut self, other: AuditReport) {
        self.findings.extend(other.findings);
        self.unknown_directories.extend(other.unknown_directories);
        self.cancelled |= other.cancelled;
    }

    /// Every file was checked and every file is where it belongs. A cancelled
    /// audit is never clean, however few files it reached.
    pub fn is_clean(&self) -> bool {
        let counts = self.counts();
        !self.cancelled && counts.correct == counts.total
    }
}

/// Classify a single file found in the directory of `found_label`.
pub fn classify(
    path: &Path,
    found_label: &Label,
    mapping: &LabelMapping,
    naming: &FilenameLayout,
) -> AuditOutcome {
    let id = match parse_path_identifier(path, naming) {
        Ok(id) => id,
        Err(e) => return AuditOutcome::UnparsableIdentifier(e),
    };
    match mapping.get(id) {
        Some(expected) if expected == found_label => AuditOutcome::Correct,
        Some(expected) => AuditOutcome::Incorrect {
            expected: expected.clone(),
        },
        None => AuditOutcome::MissingMapping(id),
    }
}

/// Audit every file in the given directories.
pub fn audit<I>(
    targets: I,
    mapping: &LabelMapping,
    naming: &FilenameLayout,
    extensions: &[String],
    control: &StageControl,
) -> PipelineResult<AuditReport>
where
    I: IntoIterator<Item = AuditTarget>,
{
    let mut queue = Vec::new();
    for target in targets {
        let files = list_item_files(&target.dir, extensions)
            .map_err(|e| PipelineError::io(&target.dir, e))?;
        queue.push((target, files));
    }
    let total: usize = queue.iter().map(|(_, files)| files.len()).sum();

    let mut report = AuditReport::default();
    'targets: for (target, files) in queue {
        for path in files {
            if control.is_cancelled() {
                control.cancelled(Stage::Audit, report.findings.len(), total);
                report.cancelled = true;
                break 'targets;
            }
            let outcome = classify(&path, &target.label, mapping, naming);
            match &outcome {
                AuditOutcome::Correct => {}
                AuditOutcome::Incorrect { expected } => warn!(
                    "Incorrect placement: {:?} is in {} but belongs to '{}'",
                    path, target.dirname, expected
                ),
                AuditOutcome::MissingMapping(id) => {
                    warn!("No label found for key {} in file {:?}", id, path)
                }
                AuditOutcome::UnparsableIdentifier(e) => {
                    warn!("Could not parse file name {:?}: {}", path, e)
                }
            }
            report.findings.push(AuditFinding {
                path,
                partition: target.partition,
                found_label: target.label.clone(),
                outcome,
            });
        }
    }

    let counts = report.counts();
    if report.cancelled {
        warn!(
            "Validation cancelled after {} of {} files: {} correct, {} incorrect",
            counts.total, total, counts.correct, counts.incorrect
        );
    } else {
        info!(
            "Validation complete: {}/{} correct, {} incorrect, {} errors",
            counts.correct,
            counts.total,
            counts.incorrect,
            counts.errors()
        );
    }
    Ok(report)
}

/// Targets for `root/<dirname>/`, plus any sub-directory matching no label.
pub fn organized_targets(
    root: &Path,
    dirs: &LabelDirectories,
) -> PipelineResult<(Vec<AuditTarget>, Vec<PathBuf>)> {
    targets_under(root, None, dirs)
}

/// Targets for `root/<partition>/<dirname>/` across all partitions. Any
/// directory directly under `root` that is not a partition is reported as
/// unknown.
pub fn split_targets(
    root: &Path,
    dirs: &LabelDirectories,
) -> PipelineResult<(Vec<AuditTarget>, Vec<PathBuf>)> {
    let mut targets = Vec::new();
    let mut unknown = Vec::new();
    for name in list_subdirectories(root).map_err(|e| PipelineError::io(root, e))? {
        if Partition::from_dir_name(&name).is_none() {
            warn!("Directory {:?} is not a partition", root.join(&name));
            unknown.push(root.join(name));
        }
    }
    for partition in Partition::ALL {
        let partition_root = root.join(partition.as_str());
        if !partition_root.is_dir() {
            warn!("Partition directory {:?} is missing", partition_root);
            continue;
        }
        let (t, u) = targets_under(&partition_root, Some(partition), dirs)?;
        targets.extend(t);
        unknown.extend(u);
    }
    Ok((targets, unknown))
}

fn targets_under(
    root: &Path,
    partition: Option<Partition>,
    dirs: &LabelDirectories,
) -> PipelineResult<(Vec<AuditTarget>, Vec<PathBuf>)> {
    let present: HashSet<String> = list_subdirectories(root)
        .map_err(|e| PipelineError::io(root, e))?
        .into_iter()
        .collect();

    let mut unknown = Vec::new();
    for name in &present {
        if dirs.label_for_dir(name).is_none() {
            warn!("Directory {:?} does not match any known label", root.join(name));
            unknown.push(root.join(name));
        }
    }
    unknown.sort();

    let targets = dirs
        .iter()
        .filter(|(_, dirname)| present.contains(*dirname))
        .map(|(label, dirname)| AuditTarget {
            partition,
            label: label.clone(),
            dirname: dirname.to_string(),
            dir: root.join(dirname),
        })
        .collect();
    Ok((targets, unknown))
}

/// Audit an organized layout rooted at `root`.
pub fn audit_organized(
    root: &Path,
    dirs: &LabelDirectories,
    mapping: &LabelMapping,
    naming: &FilenameLayout,
    extensions: &[String],
    control: &StageControl,
) -> PipelineResult<AuditReport> {
    let _span = info_span!("audit").entered();
    info!("Validating image organization under {:?}", root);
    let (targets, unknown) = organized_targets(root, dirs)?;
    let mut report = audit(targets, mapping, naming, extensions, control)?;
    report.unknown_directories = unknown;
    Ok(report)
}

/// Audit a split layout rooted at `root`.
pub fn audit_split(
    root: &Path,
    dirs: &LabelDirectories,
    mapping: &LabelMapping,
    naming: &FilenameLayout,
    extensions: &[String],
    control: &StageControl,
) -> PipelineResult<AuditReport> {
    let _span = info_span!("audit").entered();
    info!("Validating split layout under {:?}", root);
    let (targets, unknown) = split_targets(root, dirs)?;
    let mut report = audit(targets, mapping, naming, extensions, control)?;
    report.unknown_directories = unknown;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::{OrganizedLayout, SplitLayout};
    use crate::core::operations::ProgressMessage;
    use std::fs;
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc::channel;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn exts() -> Vec<String> {
        vec!["png".to_string()]
    }

    fn mapping() -> LabelMapping {
        [
            (ItemId(1), Label::new("BCC")),
            (ItemId(2), Label::new("MEL")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_classify_round_trip() {
        let mapping = mapping();
        let naming = FilenameLayout::default();
        let file = Path::new("PAT_7_1_0.png");

        assert_eq!(
            classify(file, &Label::new("BCC"), &mapping, &naming),
            AuditOutcome::Correct
        );
        assert_eq!(
            classify(file, &Label::new("MEL"), &mapping, &naming),
            AuditOutcome::Incorrect {
                expected: Label::new("BCC")
            }
        );
        assert_eq!(
            classify(Path::new("PAT_7_5_0.png"), &Label::new("MEL"), &mapping, &naming),
            AuditOutcome::MissingMapping(ItemId(5))
        );
        assert!(matches!(
            classify(Path::new("badname.png"), &Label::new("MEL"), &mapping, &naming),
            AuditOutcome::UnparsableIdentifier(_)
        ));
    }

    #[test]
    fn test_audit_organized_flags_relocated_file() {
        let temp = tempdir().unwrap();
        let mapping = mapping();
        let layout = OrganizedLayout::build(temp.path(), mapping.labels()).unwrap();
        fs::write(temp.path().join("BCC").join("PAT_7_1_0.png"), b"x").unwrap();
        fs::write(temp.path().join("MEL").join("PAT_7_2_0.png"), b"x").unwrap();
        fs::write(temp.path().join("MEL").join("PAT_7_1_1.png"), b"x").unwrap();
        fs::write(temp.path().join("MEL").join("badname.png"), b"x").unwrap();
        fs::create_dir(temp.path().join("stray")).unwrap();

        let report = audit_organized(
            temp.path(),
            layout.directories(),
            &mapping,
            &FilenameLayout::default(),
            &exts(),
            &StageControl::default(),
        )
        .unwrap();

        let counts = report.counts();
        assert_eq!(counts.total, 4);
        assert_eq!(counts.correct, 2);
        assert_eq!(counts.incorrect, 1);
        assert_eq!(counts.unparsable, 1);
        assert_eq!(report.unknown_directories, vec![temp.path().join("stray")]);

        let misplaced: Vec<_> = report.misplaced().collect();
        assert_eq!(misplaced[0].found_label, Label::new("MEL"));
        assert_eq!(
            misplaced[0].outcome,
            AuditOutcome::Incorrect {
                expected: Label::new("BCC")
            }
        );
        // read-only
        assert!(temp.path().join("MEL").join("PAT_7_1_1.png").exists());
    }

    #[test]
    fn test_audit_split_tags_partition() {
        let temp = tempdir().unwrap();
        let mapping = mapping();
        let dirs = LabelDirectories::plan(mapping.labels()).unwrap();
        let layout = SplitLayout::create(temp.path(), dirs).unwrap();
        let dir = layout
            .label_dir(Partition::Validation, &Label::new("MEL"))
            .unwrap();
        fs::write(dir.join("PAT_3_2_0.png"), b"x").unwrap();

        let report = audit_split(
            temp.path(),
            layout.directories(),
            &mapping,
            &FilenameLayout::default(),
            &exts(),
            &StageControl::default(),
        )
        .unwrap();

        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].partition, Some(Partition::Validation));
        assert!(report.unknown_directories.is_empty());
        assert!(report.is_clean());
    }

    #[test]
    fn test_audit_split_reports_stray_partition_dir() {
        let temp = tempdir().unwrap();
        let mapping = mapping();
        let dirs = LabelDirectories::plan(mapping.labels()).unwrap();
        SplitLayout::create(temp.path(), dirs.clone()).unwrap();
        fs::create_dir(temp.path().join("val")).unwrap();

        let report = audit_split(
            temp.path(),
            &dirs,
            &mapping,
            &FilenameLayout::default(),
            &exts(),
            &StageControl::default(),
        )
        .unwrap();
        assert_eq!(report.unknown_directories, vec![temp.path().join("val")]);
    }

    #[test]
    fn test_cancelled_audit_is_not_clean() {
        let temp = tempdir().unwrap();
        let mapping = mapping();
        let layout = OrganizedLayout::build(temp.path(), mapping.labels()).unwrap();
        fs::write(temp.path().join("BCC").join("PAT_7_1_0.png"), b"x").unwrap();
        fs::write(temp.path().join("MEL").join("PAT_7_2_0.png"), b"x").unwrap();

        let (tx, rx) = channel();
        let control = StageControl::default()
            .with_progress(tx)
            .with_cancel_flag(Arc::new(AtomicBool::new(true)));
        let report = audit_organized(
            temp.path(),
            layout.directories(),
            &mapping,
            &FilenameLayout::default(),
            &exts(),
            &control,
        )
        .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.counts().total, 0);
        assert!(!report.is_clean());
        drop(control);
        assert_eq!(
            rx.iter().collect::<Vec<_>>(),
            vec![ProgressMessage::Cancelled {
                stage: Stage::Audit,
                completed: 0,
                total: 2
            }]
        );

        let mut merged = AuditReport::default();
        merged.merge(report);
        assert!(!merged.is_clean());
    }
}
