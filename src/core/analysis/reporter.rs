use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, info_span};

use super::auditor::{AuditCounts, AuditReport};
use super::partitioner::{SplitCounts, SplitRatios};
use crate::core::corpus::Label;
use crate::core::dataset::Partition;
use crate::core::operations::StageResult;
use crate::error::{PipelineError, PipelineResult};

pub const REPORT_FILE: &str = "split_report.txt";
pub const REPORT_JSON_FILE: &str = "split_report.json";

/// Per-label partition sizes. `train + validation + test == total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitStats {
    pub label: Label,
    pub total: usize,
    pub train: usize,
    pub validation: usize,
    pub test: usize,
}

impl SplitStats {
    pub fn from_counts(label: Label, counts: SplitCounts) -> Self {
        Self {
            label,
            total: counts.total(),
            train: counts.train,
            validation: counts.validation,
            test: counts.test,
        }
    }

    pub fn counts(&self) -> SplitCounts {
        SplitCounts {
            train: self.train,
            validation: self.validation,
            test: self.test,
        }
    }

    pub fn is_conserved(&self) -> bool {
        self.train + self.validation + self.test == self.total
    }
}

/// Percentage of `part` in `total`, rounded to one decimal.
pub fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub label: String,
    pub total: usize,
    pub train: usize,
    pub train_pct: f64,
    pub validation: usize,
    pub validation_pct: f64,
    pub test: usize,
    pub test_pct: f64,
}

impl ReportRow {
    fn new(label: String, total: usize, counts: SplitCounts) -> Self {
        Self {
            label,
            total,
            train: counts.train,
            train_pct: percent(counts.train, total),
            validation: counts.validation,
            validation_pct: percent(counts.validation, total),
            test: counts.test,
            test_pct: percent(counts.test, total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionShare {
    pub partition: Partition,
    pub count: usize,
    pub pct: f64,
}

/// Operational errors and data-quality findings, shown beside the counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Anomalies {
    pub organize_errors: usize,
    pub split_errors: usize,
    pub audit: Option<AuditCounts>,
    pub unknown_directories: usize,
    /// Some stage stopped early; the table then shows planned counts.
    pub cancelled: bool,
    /// Queued items no stage got to, summed over organize and split.
    pub unprocessed: usize,
}

impl Anomalies {
    pub fn with_organize(mut self, result: &StageResult) -> Self {
        self.organize_errors = result.failed();
        self.record_stage(result);
        self
    }

    pub fn with_split(mut self, result: &StageResult) -> Self {
        self.split_errors = result.failed();
        self.record_stage(result);
        self
    }

    pub fn with_audit(mut self, report: &AuditReport) -> Self {
        self.audit = Some(report.counts());
        self.unknown_directories = report.unknown_directories.len();
        self.cancelled |= report.cancelled;
        self
    }

    fn record_stage(&mut self, result: &StageResult) {
        self.cancelled |= result.cancelled;
        self.unprocessed += result.unprocessed();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    pub generated_at: String,
    pub seed: u64,
    pub ratios: SplitRatios,
    pub rows: Vec<ReportRow>,
    pub totals: ReportRow,
    pub partitions: Vec<PartitionShare>,
    pub anomalies: Anomalies,
}

impl SplitReport {
    /// Rows are sorted by label. The totals row is computed from summed
    /// counts, not by averaging the per-label percentages.
    pub fn build(stats: &[SplitStats], ratios: &SplitRatios, seed: u64) -> Self {
        let mut sorted: Vec<&SplitStats> = stats.iter().collect();
        sorted.sort_by(|a, b| a.label.cmp(&b.label));

        let rows = sorted
            .iter()
            .map(|s| ReportRow::new(s.label.to_string(), s.total, s.counts()))
            .collect();

        let summed = stats.iter().fold(SplitCounts::default(), |acc, s| SplitCounts {
            train: acc.train + s.train,
            validation: acc.validation + s.validation,
            test: acc.test + s.test,
        });
        let grand_total: usize = stats.iter().map(|s| s.total).sum();
        let totals = ReportRow::new("TOTAL".to_string(), grand_total, summed);

        let partitions = Partition::ALL
            .into_iter()
            .map(|p| PartitionShare {
                partition: p,
                count: summed.get(p),
                pct: percent(summed.get(p), grand_total),
            })
            .collect();

        Self {
            generated_at: chrono::Local::now().to_rfc3339(),
            seed,
            ratios: *ratios,
            rows,
            totals,
            partitions,
            anomalies: Anomalies::default(),
        }
    }

    pub fn with_anomalies(mut self, anomalies: Anomalies) -> Self {
        self.anomalies = anomalies;
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Dataset Split Report");
        let _ = writeln!(out, "====================");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Train ratio: {:.0}%, Validation ratio: {:.0}%, Test ratio: {:.0}%",
            self.ratios.train * 100.0,
            self.ratios.validation * 100.0,
            self.ratios.test * 100.0
        );
        let _ = writeln!(out, "Seed: {}", self.seed);
        let _ = writeln!(out, "Generated: {}", self.generated_at);
        if self.anomalies.cancelled {
            let _ = writeln!(
                out,
                "Status: CANCELLED, {} items were not processed; counts below are planned",
                self.anomalies.unprocessed
            );
        }
        let _ = writeln!(out);

        let width = self
            .rows
            .iter()
            .map(|r| r.label.len())
            .chain(["Label".len(), self.totals.label.len()])
            .max()
            .unwrap_or(5);

        let _ = writeln!(
            out,
            "{:<width$} {:>7} {:>7} {:>8} {:>7} {:>8} {:>7} {:>8}",
            "Label", "Total", "Train", "Train %", "Val", "Val %", "Test", "Test %",
            width = width
        );
        let _ = writeln!(out, "{}", "-".repeat(width + 60));
        for row in self.rows.iter().chain(std::iter::once(&self.totals)) {
            let _ = writeln!(
                out,
                "{:<width$} {:>7} {:>7} {:>8.1} {:>7} {:>8.1} {:>7} {:>8.1}",
                row.label,
                row.total,
                row.train,
                row.train_pct,
                row.validation,
                row.validation_pct,
                row.test,
                row.test_pct,
                width = width
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "By partition:");
        for share in &self.partitions {
            let _ = writeln!(
                out,
                "  {:<10} {:>7} ({:.1}%)",
                share.partition.as_str(),
                share.count,
                share.pct
            );
        }

        let a = &self.anomalies;
        let _ = writeln!(out);
        let _ = writeln!(out, "Anomalies:");
        let _ = writeln!(out, "  Organize errors:      {}", a.organize_errors);
        let _ = writeln!(out, "  Split errors:         {}", a.split_errors);
        let _ = writeln!(out, "  Cancelled:            {}", if a.cancelled { "yes" } else { "no" });
        let _ = writeln!(out, "  Unprocessed items:    {}", a.unprocessed);
        match &a.audit {
            Some(audit) => {
                let _ = writeln!(
                    out,
                    "  Audit:                {}/{} correct",
                    audit.correct, audit.total
                );
                let _ = writeln!(out, "  Incorrect placements: {}", audit.incorrect);
                let _ = writeln!(out, "  Missing mapping:      {}", audit.missing_mapping);
                let _ = writeln!(out, "  Unparsable names:     {}", audit.unparsable);
            }
            None => {
                let _ = writeln!(out, "  Audit:                not run");
            }
        }
        let _ = writeln!(out, "  Unknown directories:  {}", a.unknown_directories);
        out
    }

    /// Write `split_report.txt` and `split_report.json` into `dir`.
    pub fn write(&self, dir: &Path) -> PipelineResult<PathBuf> {
        let _span = info_span!("report").entered();
        fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;

        let text_path = dir.join(REPORT_FILE);
        fs::write(&text_path, self.render()).map_err(|e| PipelineError::io(&text_path, e))?;

        let json_path = dir.join(REPORT_JSON_FILE);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("cannot serialize report: {}", e)))?;
        fs::write(&json_path, json).map_err(|e| PipelineError::io(&json_path, e))?;

        info!("Report saved to {:?}", text_path);
        Ok(text_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn stats(label: &str, train: usize, validation: usize, test: usize) -> SplitStats {
        SplitStats::from_counts(
            Label::new(label),
            SplitCounts {
                train,
                validation,
                test,
            },
        )
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(percent(1, 3), 33.3);
        assert_eq!(percent(2, 3), 66.7);
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(7, 10), 70.0);
    }

    #[test]
    fn test_totals_use_aggregated_counts() {
        // per-label train shares 100% and 50%; their mean would be 75%
        let all = vec![stats("B", 1, 0, 0), stats("A", 50, 0, 50)];
        let report = SplitReport::build(&all, &SplitRatios::default(), 42);

        assert_eq!(report.rows[0].label, "A");
        assert_eq!(report.totals.total, 101);
        assert_eq!(report.totals.train, 51);
        assert_eq!(report.totals.train_pct, 50.5);
        assert_eq!(report.partitions[0].count, 51);
    }

    #[test]
    fn test_render_contains_header_and_rows() {
        let all = vec![stats("MEL", 7, 1, 2), stats("NEV", 4, 0, 3)];
        let report = SplitReport::build(&all, &SplitRatios::default(), 42)
            .with_anomalies(Anomalies::default().with_audit(&AuditReport::default()));
        let text = report.render();

        assert!(text.starts_with("Dataset Split Report\n"));
        assert!(text.contains("Train ratio: 70%, Validation ratio: 10%, Test ratio: 20%"));
        assert!(text.contains("Seed: 42"));
        let mel_line = text.lines().find(|l| l.starts_with("MEL")).unwrap();
        let cells: Vec<&str> = mel_line.split_whitespace().collect();
        assert_eq!(cells, vec!["MEL", "10", "7", "70.0", "1", "10.0", "2", "20.0"]);
        let total_line = text.lines().find(|l| l.starts_with("TOTAL")).unwrap();
        assert!(total_line.split_whitespace().any(|c| c == "17"));
        assert!(text.contains("0/0 correct"));
        assert!(text.contains("Cancelled:            no"));
        assert!(!text.contains("CANCELLED"));
    }

    #[test]
    fn test_cancelled_stages_show_in_report() {
        let mut split = StageResult::with_queued(10);
        for _ in 0..3 {
            split.record_success();
        }
        split.cancelled = true;
        let audit = AuditReport {
            cancelled: true,
            ..AuditReport::default()
        };

        let anomalies = Anomalies::default()
            .with_organize(&StageResult::with_queued(0))
            .with_split(&split)
            .with_audit(&audit);
        assert!(anomalies.cancelled);
        assert_eq!(anomalies.unprocessed, 7);

        let report = SplitReport::build(&[stats("BCC", 7, 1, 2)], &SplitRatios::default(), 42)
            .with_anomalies(anomalies);
        let text = report.render();
        assert!(text.contains("Status: CANCELLED, 7 items were not processed"));
        assert!(text.contains("Unprocessed items:    7"));
    }

    #[test]
    fn test_write_creates_text_and_json() {
        let temp = tempdir().unwrap();
        let report = SplitReport::build(&[stats("A", 7, 1, 2)], &SplitRatios::default(), 1);
        let path = report.write(temp.path()).unwrap();

        assert_eq!(path, temp.path().join(REPORT_FILE));
        assert!(fs::read_to_string(&path).unwrap().contains("TOTAL"));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(temp.path().join(REPORT_JSON_FILE)).unwrap())
                .unwrap();
        assert_eq!(json["totals"]["train"], 7);
        assert_eq!(json["seed"], 1);
    }
}
