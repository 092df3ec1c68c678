use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::Sender,
    Arc,
};
use tracing::{info, warn};

use crate::core::corpus::{ItemId, ParseError};

/// Pipeline stage, used for progress messages and log spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Organize,
    Split,
    Audit,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Organize => "organize",
            Stage::Split => "split",
            Stage::Audit => "audit",
        }
    }
}

/// Why a single item could not be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemErrorKind {
    UnparsableIdentifier(ParseError),
    MissingMapping(ItemId),
    Io(String),
}

impl ItemErrorKind {
    /// The label could not be resolved (as opposed to an I/O failure).
    pub fn is_unresolved_label(&self) -> bool {
        matches!(
            self,
            ItemErrorKind::UnparsableIdentifier(_) | ItemErrorKind::MissingMapping(_)
        )
    }
}

impl std::fmt::Display for ItemErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemErrorKind::UnparsableIdentifier(e) => write!(f, "unparsable identifier: {}", e),
            ItemErrorKind::MissingMapping(id) => write!(f, "no label found for key {}", id),
            ItemErrorKind::Io(msg) => write!(f, "I/O failure: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    pub path: PathBuf,
    pub kind: ItemErrorKind,
}

impl ItemError {
    pub fn new(path: impl Into<PathBuf>, kind: ItemErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Outcome of one materialization stage. `processed == succeeded + errors.len()`
/// and `processed <= queued`; a gap means the stage was cancelled.
#[derive(Debug, Clone, Default)]
pub struct StageResult {
    /// Items the stage set out to process.
    pub queued: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub errors: Vec<ItemError>,
    pub cancelled: bool,
}

impl StageResult {
    pub fn with_queued(queued: usize) -> Self {
        Self {
            queued,
            ..Self::default()
        }
    }

    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    pub fn record_error(&mut self, error: ItemError) {
        warn!("{:?}: {}", error.path, error.kind);
        self.processed += 1;
        self.errors.push(error);
    }

    /// Append another result; used to combine per-label or per-worker buffers.
    pub fn merge(&mut self, other: StageResult) {
        self.queued += other.queued;
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.errors.extend(other.errors);
        self.cancelled |= other.cancelled;
    }

    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    pub fn unresolved_count(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| e.kind.is_unresolved_label())
            .count()
    }

    pub fn io_error_count(&self) -> usize {
        self.failed() - self.unresolved_count()
    }

    /// Queued items the stage never reached.
    pub fn unprocessed(&self) -> usize {
        self.queued.saturating_sub(self.processed)
    }
}

/// Progress message sent while a stage runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressMessage {
    Progress {
        stage: Stage,
        current: usize,
        total: usize,
    },
    Complete {
        stage: Stage,
        succeeded: usize,
        failed: usize,
    },
    Cancelled {
        stage: Stage,
        completed: usize,
        total: usize,
    },
}

/// Progress channel, reporting interval and cancellation flag for one run.
#[derive(Debug, Clone)]
pub struct StageControl {
    pub progress_tx: Option<Sender<ProgressMessage>>,
    pub cancel_flag: Option<Arc<AtomicBool>>,
    pub progress_interval: usize,
}

impl Default for StageControl {
    fn default() -> Self {
        Self {
            progress_tx: None,
            cancel_flag: None,
            progress_interval: 100,
        }
    }
}

impl StageControl {
    pub fn with_progress(mut self, tx: Sender<ProgressMessage>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    pub fn with_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Called after every item; reports every `progress_interval` items.
    pub fn tick(&self, stage: Stage, result: &StageResult, total: usize) {
        let current = result.processed;
        if current % self.progress_interval.max(1) != 0 {
            return;
        }
        info!(
            "Processed {}/{} items, placed {}, errors {}",
            current,
            total,
            result.succeeded,
            result.failed()
        );
        self.send(ProgressMessage::Progress {
            stage,
            current,
            total,
        });
    }

    pub fn cancelled(&self, stage: Stage, completed: usize, total: usize) {
        warn!("{} cancelled at {}/{}", stage.as_str(), completed, total);
        self.send(ProgressMessage::Cancelled {
            stage,
            completed,
            total,
        });
    }

    pub fn complete(&self, stage: Stage, result: &StageResult) {
        self.send(ProgressMessage::Complete {
            stage,
            succeeded: result.succeeded,
            failed: result.failed(),
        });
    }

    fn send(&self, message: ProgressMessage) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(message);
        }
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
