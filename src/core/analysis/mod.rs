mod auditor;
mod partitioner;
mod reporter;
mod summary;

pub use auditor::{
    audit, audit_organized, audit_split, classify, organized_targets, split_targets, AuditCounts,
    AuditFinding, AuditOutcome, AuditReport, AuditTarget,
};
pub use partitioner::{
    split, PartitionAssignment, SplitCounts, SplitRatios, DEFAULT_SEED, RATIO_TOLERANCE,
};
pub use reporter::{
    percent, Anomalies, PartitionShare, ReportRow, SplitReport, SplitStats, REPORT_FILE,
    REPORT_JSON_FILE,
};
pub use summary::label_counts;
