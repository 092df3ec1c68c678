mod label_dirs;
mod partition;

pub use label_dirs::{sanitize_label, LabelDirectories, OrganizedLayout, SplitLayout};
pub use partition::Partition;
