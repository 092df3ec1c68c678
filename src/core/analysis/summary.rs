use std::path::Path;
use tracing::info;

use crate::core::corpus::{list_item_files, Label};
use crate::core::dataset::LabelDirectories;
use crate::error::{PipelineError, PipelineResult};

/// Number of images in each `root/<dirname>/`, in label order.
pub fn label_counts(
    root: &Path,
    dirs: &LabelDirectories,
    extensions: &[String],
) -> PipelineResult<Vec<(Label, usize)>> {
    info!("Summary of images by label:");
    let mut counts = Vec::with_capacity(dirs.len());
    let mut total = 0;
    for (label, dirname) in dirs.iter() {
        let dir = root.join(dirname);
        let n = if dir.is_dir() {
            list_item_files(&dir, extensions)
                .map_err(|e| PipelineError::io(&dir, e))?
                .len()
        } else {
            0
        };
        info!("{}: {} images", label, n);
        total += n;
        counts.push((label.clone(), n));
    }
    info!("Total: {} images", total);
    Ok(counts)
}
