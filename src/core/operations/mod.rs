mod file_ops;
mod stage;

pub use file_ops::{copy_file, move_file, FileOpError, FileOpResult, TransferMode};
pub(crate) use stage::file_name_of;
pub use stage::{ItemError, ItemErrorKind, ProgressMessage, Stage, StageControl, StageResult};
