use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, error};

/// Result type for file operations
pub type FileOpResult<T> = Result<T, FileOpError>;

/// Error types for file operations
#[derive(Debug)]
pub enum FileOpError {
    CopyFailed(String),
    RemoveFailed(String),
}

impl std::fmt::Display for FileOpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOpError::CopyFailed(msg) => write!(f, "Copy failed: {}", msg),
            FileOpError::RemoveFailed(msg) => write!(f, "Remove failed: {}", msg),
        }
    }
}

impl std::error::Error for FileOpError {}

/// Whether materialization keeps the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    #[default]
    Copy,
    Move,
}

impl TransferMode {
    pub fn as_str(&self) -> &str {
        match self {
            TransferMode::Copy => "copy",
            TransferMode::Move => "move",
        }
    }

    /// Copy or move `src` to `dest`, overwriting `dest` if it exists.
    pub fn apply(&self, src: &Path, dest: &Path) -> FileOpResult<()> {
        match self {
            TransferMode::Copy => copy_file(src, dest),
            TransferMode::Move => move_file(src, dest),
        }
    }
}

/// Copy a file, keeping the source in place.
pub fn copy_file(src: &Path, dest: &Path) -> FileOpResult<()> {
    debug!("Copying file from {:?} to {:?}", src, dest);
    fs::copy(src, dest).map(|_| ()).map_err(|e| {
        error!("Failed to copy file from {:?} to {:?}: {}", src, dest, e);
        FileOpError::CopyFailed(format!("{:?} -> {:?}: {}", src, dest, e))
    })
}

/// Move a file from source to destination using copy + remove pattern
/// for cross-drive compatibility.
pub fn move_file(src: &Path, dest: &Path) -> FileOpResult<()> {
    debug!("Moving file from {:?} to {:?}", src, dest);

    copy_file(src, dest)?;

    if let Err(e) = fs::remove_file(src) {
        error!("Failed to remove original file {:?} after copy: {}", src, e);
        // Leave exactly one copy behind
        let _ = fs::remove_file(dest);
        return Err(FileOpError::RemoveFailed(format!(
            "Failed to remove original file {:?}: {}",
            src, e
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_copy_keeps_source() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("a.png");
        let dest = temp.path().join("b.png");
        fs::write(&src, b"pixels").unwrap();

        TransferMode::Copy.apply(&src, &dest).unwrap();

        assert!(src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"pixels");
    }

    #[test]
    fn test_move_removes_source() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("a.png");
        let dest = temp.path().join("b.png");
        fs::write(&src, b"pixels").unwrap();

        TransferMode::Move.apply(&src, &dest).unwrap();

        assert!(!src.exists());
        assert!(dest.exists());
    }

    #[test]
    fn test_missing_source_fails() {
        let temp = tempdir().unwrap();
        let result = copy_file(&temp.path().join("none.png"), &temp.path().join("x.png"));
        assert!(matches!(result, Err(FileOpError::CopyFailed(_))));
    }

    #[test]
    fn test_copy_overwrites_existing_destination() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("a.png");
        let dest = temp.path().join("b.png");
        fs::write(&src, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        copy_file(&src, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }
}
