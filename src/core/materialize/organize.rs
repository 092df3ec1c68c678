use std::path::{Path, PathBuf};
use tracing::{info, info_span};

use crate::core::corpus::{list_item_files, resolve_item, FilenameLayout, LabelMapping};
use crate::core::dataset::OrganizedLayout;
use crate::core::operations::{
    file_name_of, ItemError, ItemErrorKind, Stage, StageControl, StageResult, TransferMode,
};
use crate::error::{PipelineError, PipelineResult};

/// Place one image into its label directory, keeping its file name.
///
/// An existing file of the same name is overwritten.
pub fn place(
    source: &Path,
    layout: &OrganizedLayout,
    mapping: &LabelMapping,
    naming: &FilenameLayout,
    mode: TransferMode,
) -> Result<PathBuf, ItemErrorKind> {
    let item = resolve_item(source, naming, mapping)?;
    // Every mapping label has a directory, the layout was built from them.
    let dir = layout
        .label_dir(&item.label)
        .ok_or(ItemErrorKind::MissingMapping(item.id))?;
    let dest = dir.join(file_name_of(source));

    mode.apply(source, &dest)
        .map_err(|e| ItemErrorKind::Io(e.to_string()))?;
    Ok(dest)
}

/// Copy (or move) every image under `source_dir` into `layout`.
///
/// Per-item failures are collected in the returned result; only a missing
/// source directory aborts.
pub fn organize_images(
    source_dir: &Path,
    layout: &OrganizedLayout,
    mapping: &LabelMapping,
    naming: &FilenameLayout,
    extensions: &[String],
    mode: TransferMode,
    control: &StageControl,
) -> PipelineResult<StageResult> {
    let _span = info_span!("organize").entered();

    if !source_dir.is_dir() {
        return Err(PipelineError::MissingSourceDirectory(source_dir.to_path_buf()));
    }
    let files =
        list_item_files(source_dir, extensions).map_err(|e| PipelineError::io(source_dir, e))?;
    let total = files.len();
    info!(
        "Organizing {} images from {:?} into {:?} ({})",
        total,
        source_dir,
        layout.root(),
        mode.as_str()
    );

    let mut result = StageResult::with_queued(total);
    for path in &files {
        if control.is_cancelled() {
            control.cancelled(Stage::Organize, result.processed, total);
            result.cancelled = true;
            return Ok(result);
        }

        match place(path, layout, mapping, naming, mode) {
            Ok(_) => result.record_success(),
            Err(kind) => result.record_error(ItemError::new(path, kind)),
        }
        control.tick(Stage::Organize, &result, total);
    }

    info!(
        "Finished processing {} images: {} placed, {} errors",
        result.processed,
        result.succeeded,
        result.failed()
    );
    control.complete(Stage::Organize, &result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::corpus::{ItemId, Label, ParseError};
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
    fn test_organizes_and_accumulates_errors() {
        let temp = tempdir().unwrap();
        let images = temp.path().join("images");
        fs::create_dir(&images).unwrap();
        for name in ["PAT_9_1_0.png", "PAT_9_2_0.png", "PAT_9_2_1.png", "PAT_9_3_0.png", "badname.png"] {
            fs::write(images.join(name), name.as_bytes()).unwrap();
        }
        let mapping = mapping();
        let layout = OrganizedLayout::build(&temp.path().join("organized"), mapping.labels()).unwrap();

        let result = organize_images(
            &images,
            &layout,
            &mapping,
            &FilenameLayout::default(),
            &exts(),
            TransferMode::Copy,
            &StageControl::default(),
        )
        .unwrap();

        assert_eq!(result.processed, 5);
        assert_eq!(result.succeeded, 3);
        assert_eq!(result.unresolved_count(), 2);
        assert!(layout.root().join("MEL").join("PAT_9_2_1.png").exists());
        assert!(layout.root().join("BCC").join("PAT_9_1_0.png").exists());
        assert!(images.join("PAT_9_1_0.png").exists());

        let kinds: Vec<&ItemErrorKind> = result.errors.iter().map(|e| &e.kind).collect();
        assert!(kinds.contains(&&ItemErrorKind::MissingMapping(ItemId(3))));
        assert!(kinds.iter().any(|k| matches!(
            k,
            ItemErrorKind::UnparsableIdentifier(ParseError::TooFewTokens { .. })
        )));
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let temp = tempdir().unwrap();
        let mapping = mapping();
        let layout = OrganizedLayout::build(&temp.path().join("organized"), mapping.labels()).unwrap();
        let err = organize_images(
            &temp.path().join("nope"),
            &layout,
            &mapping,
            &FilenameLayout::default(),
            &exts(),
            TransferMode::Copy,
            &StageControl::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::MissingSourceDirectory(_)));
    }

    #[test]
    fn test_cancel_stops_before_any_item() {
        let temp = tempdir().unwrap();
        let images = temp.path().join("images");
        fs::create_dir(&images).unwrap();
        fs::write(images.join("PAT_9_1_0.png"), b"x").unwrap();
        let mapping = mapping();
        let layout = OrganizedLayout::build(&temp.path().join("organized"), mapping.labels()).unwrap();

        let (tx, rx) = channel();
        let control = StageControl::default()
            .with_progress(tx)
            .with_cancel_flag(Arc::new(AtomicBool::new(true)));
        let result = organize_images(
            &images,
            &layout,
            &mapping,
            &FilenameLayout::default(),
            &exts(),
            TransferMode::Copy,
            &control,
        )
        .unwrap();

        assert!(result.cancelled);
        assert_eq!(result.processed, 0);
        assert_eq!(result.unprocessed(), 1);
        assert!(!layout.root().join("BCC").join("PAT_9_1_0.png").exists());
        drop(control);
        assert_eq!(
            rx.iter().collect::<Vec<_>>(),
            vec![ProgressMessage::Cancelled {
                stage: Stage::Organize,
                completed: 0,
                total: 1
            }]
        );
    }
}
