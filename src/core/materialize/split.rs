use std::path::PathBuf;
use tracing::{info, info_span};

use crate::core::analysis::{split, PartitionAssignment, SplitRatios, SplitStats};
use crate::core::corpus::{list_item_files, Label};
use crate::core::dataset::{OrganizedLayout, SplitLayout};
use crate::core::operations::{
    file_name_of, ItemError, ItemErrorKind, Stage, StageControl, StageResult, TransferMode,
};
use crate::error::{PipelineError, PipelineResult};

/// The partitioning of one label directory.
#[derive(Debug, Clone)]
pub struct LabelSplit {
    pub label: Label,
    pub dirname: String,
    pub assignment: PartitionAssignment<PathBuf>,
}

impl LabelSplit {
    pub fn stats(&self) -> SplitStats {
        SplitStats::from_counts(self.label.clone(), self.assignment.counts())
    }
}

/// Every label's partitioning plus what happened while materializing it.
#[derive(Debug, Clone, Default)]
pub struct SplitOutcome {
    pub labels: Vec<LabelSplit>,
    pub result: StageResult,
}

impl SplitOutcome {
    pub fn stats(&self) -> Vec<SplitStats> {
        self.labels.iter().map(LabelSplit::stats).collect()
    }

    pub fn total_items(&self) -> usize {
        self.labels.iter().map(|l| l.assignment.len()).sum()
    }
}

/// Partition every label of `organized` independently.
///
/// Reads the full file list of each label directory before splitting it;
/// nothing is copied here.
pub fn plan_splits(
    organized: &OrganizedLayout,
    ratios: &SplitRatios,
    seed: u64,
    extensions: &[String],
) -> PipelineResult<Vec<LabelSplit>> {
    let _span = info_span!("partition").entered();
    let ratios = ratios.validate()?;

    let mut plans = Vec::with_capacity(organized.directories().len());
    for (label, dirname) in organized.directories().iter() {
        let dir = organized.root().join(dirname);
        let files = list_item_files(&dir, extensions).map_err(|e| PipelineError::io(&dir, e))?;
        let assignment = split(&files, &ratios, seed)?;
        let counts = assignment.counts();
        info!(
            "{}: {} images -> train {}, validation {}, test {}",
            label,
            files.len(),
            counts.train,
            counts.validation,
            counts.test
        );
        plans.push(LabelSplit {
            label: label.clone(),
            dirname: dirname.to_string(),
            assignment,
        });
    }
    Ok(plans)
}

/// Copy (or move) every planned item into `split/<partition>/<dirname>/`.
pub fn materialize_splits(
    plans: Vec<LabelSplit>,
    layout: &SplitLayout,
    mode: TransferMode,
    control: &StageControl,
) -> SplitOutcome {
    let _span = info_span!("split").entered();
    let total: usize = plans.iter().map(|p| p.assignment.len()).sum();
    let mut result = StageResult::with_queued(total);

    'labels: for plan in &plans {
        for (partition, source) in plan.assignment.iter() {
            if control.is_cancelled() {
                control.cancelled(Stage::Split, result.processed, total);
                result.cancelled = true;
                break 'labels;
            }

            let dest = match layout.label_dir(partition, &plan.label) {
                Some(dir) => dir.join(file_name_of(source)),
                None => {
                    result.record_error(ItemError::new(
                        source,
                        ItemErrorKind::Io(format!("no split directory for label '{}'", plan.label)),
                    ));
                    continue;
                }
            };

            match mode.apply(source, &dest) {
                Ok(()) => result.record_success(),
                Err(e) => result.record_error(ItemError::new(source, ItemErrorKind::Io(e.to_string()))),
            }
            control.tick(Stage::Split, &result, total);
        }
    }

    if !result.cancelled {
        info!(
            "Split materialized: {} placed, {} errors out of {}",
            result.succeeded,
            result.failed(),
            total
        );
        control.complete(Stage::Split, &result);
    }

    SplitOutcome {
        labels: plans,
        result,
    }
}

/// Plan and materialize in one call; planning finishes before any file is touched.
pub fn split_organized(
    organized: &OrganizedLayout,
    layout: &SplitLayout,
    ratios: &SplitRatios,
    seed: u64,
    extensions: &[String],
    mode: TransferMode,
    control: &StageControl,
) -> PipelineResult<SplitOutcome> {
    let plans = plan_splits(organized, ratios, seed, extensions)?;
    Ok(materialize_splits(plans, layout, mode, control))
}
