//! Stage orchestration: load → directories → organize → partition → split →
//! audit → report. Each stage starts only after the previous one returned.

use std::path::{Path, PathBuf};
use tracing::{info, info_span, warn};

use crate::config::PipelineConfig;
use crate::core::analysis::{
    audit_organized, audit_split, label_counts, Anomalies, AuditReport, SplitReport,
};
use crate::core::corpus::{Label, LabelMapping};
use crate::core::dataset::{LabelDirectories, OrganizedLayout, SplitLayout};
use crate::core::materialize::{
    materialize_splits, organize_images, plan_splits, SplitManifest, SplitOutcome,
};
use crate::core::operations::{StageControl, StageResult};
use crate::error::{PipelineError, PipelineResult};

pub fn load_mapping(config: &PipelineConfig) -> PipelineResult<LabelMapping> {
    let _span = info_span!("load").entered();
    let mapping = LabelMapping::load(&config.metadata_path, &config.columns())?;
    let labels: Vec<&str> = mapping.labels().iter().map(Label::as_str).collect();
    info!("Found {} unique labels: {:?}", labels.len(), labels);
    Ok(mapping)
}

fn require_dir(path: &Path) -> PipelineResult<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(PipelineError::MissingSourceDirectory(path.to_path_buf()))
    }
}

fn plan_directories(mapping: &LabelMapping) -> PipelineResult<LabelDirectories> {
    let _span = info_span!("directories").entered();
    LabelDirectories::plan(mapping.labels())
}

#[derive(Debug, Clone)]
pub struct OrganizeOutcome {
    pub layout: OrganizedLayout,
    pub result: StageResult,
    pub label_counts: Vec<(Label, usize)>,
    pub audit: AuditReport,
}

/// Group the source images into `organized_dir/<label>/` and audit the result.
pub fn organize_dataset(
    config: &PipelineConfig,
    mapping: &LabelMapping,
    control: &StageControl,
) -> PipelineResult<OrganizeOutcome> {
    config.validate()?;
    require_dir(&config.images_dir)?;
    let dirs = plan_directories(mapping)?;
    organize_with(config, mapping, dirs, control)
}

fn organize_with(
    config: &PipelineConfig,
    mapping: &LabelMapping,
    dirs: LabelDirectories,
    control: &StageControl,
) -> PipelineResult<OrganizeOutcome> {
    let layout = OrganizedLayout::create(&config.organized_dir, dirs)?;
    let result = organize_images(
        &config.images_dir,
        &layout,
        mapping,
        &config.naming,
        &config.extensions,
        config.transfer,
        control,
    )?;
    let label_counts = label_counts(layout.root(), layout.directories(), &config.extensions)?;
    let audit = audit_organized(
        layout.root(),
        layout.directories(),
        mapping,
        &config.naming,
        &config.extensions,
        control,
    )?;
    Ok(OrganizeOutcome {
        layout,
        result,
        label_counts,
        audit,
    })
}

#[derive(Debug, Clone)]
pub struct SplitRunOutcome {
    pub split: SplitOutcome,
    pub audit: AuditReport,
    pub report: SplitReport,
    pub report_path: PathBuf,
    pub manifest_path: PathBuf,
}

/// Partition `organized_dir` into `split_dir/<partition>/<label>/`, audit it
/// and write the report. `organize` is folded into the report's anomaly
/// counts when the organize phase ran in the same process.
pub fn split_dataset(
    config: &PipelineConfig,
    mapping: &LabelMapping,
    organize: Option<&StageResult>,
    control: &StageControl,
) -> PipelineResult<SplitRunOutcome> {
    config.validate()?;
    require_dir(&config.organized_dir)?;
    let dirs = plan_directories(mapping)?;
    split_with(config, mapping, dirs, organize, control)
}

fn split_with(
    config: &PipelineConfig,
    mapping: &LabelMapping,
    dirs: LabelDirectories,
    organize: Option<&StageResult>,
    control: &StageControl,
) -> PipelineResult<SplitRunOutcome> {
    let organized = OrganizedLayout::create(&config.organized_dir, dirs.clone())?;
    let plans = plan_splits(&organized, &config.ratios, config.seed, &config.extensions)?;

    let layout = SplitLayout::create(&config.split_dir, dirs)?;
    let split = materialize_splits(plans, &layout, config.transfer, control);

    let stats = split.stats();
    debug_assert!(stats.iter().all(|s| s.is_conserved()));
    if split.result.cancelled {
        warn!(
            "Split cancelled: {} of {} assigned items were not materialized",
            split.result.unprocessed(),
            split.total_items()
        );
    } else if split.result.processed != split.total_items() {
        warn!(
            "Split processed {} of {} assigned items",
            split.result.processed,
            split.total_items()
        );
    }

    let audit = audit_split(
        layout.root(),
        layout.directories(),
        mapping,
        &config.naming,
        &config.extensions,
        control,
    )?;

    let mut anomalies = Anomalies::default()
        .with_split(&split.result)
        .with_audit(&audit);
    if let Some(result) = organize {
        anomalies = anomalies.with_organize(result);
    }
    let report = SplitReport::build(&stats, &config.ratios, config.seed).with_anomalies(anomalies);
    let report_path = report.write(layout.root())?;
    let manifest_path =
        SplitManifest::from_splits(&split.labels, &config.ratios, config.seed).save(layout.root())?;

    Ok(SplitRunOutcome {
        split,
        audit,
        report,
        report_path,
        manifest_path,
    })
}

/// Read-only audit of an organized (`partitioned == false`) or split layout.
pub fn audit_dataset(
    config: &PipelineConfig,
    mapping: &LabelMapping,
    root: &Path,
    partitioned: bool,
    control: &StageControl,
) -> PipelineResult<AuditReport> {
    require_dir(root)?;
    let dirs = plan_directories(mapping)?;
    if partitioned {
        audit_split(root, &dirs, mapping, &config.naming, &config.extensions, control)
    } else {
        audit_organized(root, &dirs, mapping, &config.naming, &config.extensions, control)
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub organize: OrganizeOutcome,
    pub split: SplitRunOutcome,
}

impl RunOutcome {
    /// Item operations of both materialization phases combined.
    pub fn item_results(&self) -> StageResult {
        let mut combined = self.organize.result.clone();
        combined.merge(self.split.split.result.clone());
        combined
    }

    /// Findings of the organized and the split audit combined.
    pub fn audit(&self) -> AuditReport {
        let mut combined = self.organize.audit.clone();
        combined.merge(self.split.audit.clone());
        combined
    }

    /// Operational errors across both materialization phases.
    pub fn error_count(&self) -> usize {
        self.item_results().failed()
    }

    pub fn misplaced_count(&self) -> usize {
        self.audit().counts().incorrect
    }

    /// Any stage, audits included, stopped before finishing.
    pub fn cancelled(&self) -> bool {
        self.item_results().cancelled || self.audit().cancelled
    }
}

/// The whole pipeline. All fatal preconditions are checked before the first
/// directory is created.
pub fn run(config: &PipelineConfig, control: &StageControl) -> PipelineResult<RunOutcome> {
    let _span = info_span!("run").entered();
    config.validate()?;
    require_dir(&config.images_dir)?;
    let mapping = load_mapping(config)?;
    let dirs = plan_directories(&mapping)?;

    let organize = organize_with(config, &mapping, dirs.clone(), control)?;
    info!(
        "Corpus of {} images: {} organized, {} errors",
        organize.result.processed,
        organize.result.succeeded,
        organize.result.failed()
    );
    if organize.result.cancelled {
        warn!("Organize phase was cancelled; split runs on what was organized");
    }

    let split = split_with(config, &mapping, dirs, Some(&organize.result), control)?;
    Ok(RunOutcome { organize, split })
}
