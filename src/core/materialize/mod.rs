mod manifest;
mod organize;
mod split;

pub use manifest::{ManifestLabel, SplitManifest, MANIFEST_FILE};
pub use organize::{organize_images, place};
pub use split::{materialize_splits, plan_splits, split_organized, LabelSplit, SplitOutcome};
