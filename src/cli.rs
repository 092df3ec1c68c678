use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::core::analysis::{AuditReport, SplitRatios};
use crate::core::operations::TransferMode;
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::{self, OrganizeOutcome, SplitRunOutcome};

#[derive(Parser, Debug)]
#[command(
    name = "lesion-split",
    author,
    version,
    about = "Organize a labeled image corpus by label and split it into train/validation/test",
    long_about = None
)]
pub struct Cli {
    /// JSON configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Decrease log verbosity (repeatable)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    pub quiet: u8,

    /// Directory for log files
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Copy images into one directory per label and audit the result
    Organize(OrganizeArgs),
    /// Split an organized corpus into train/validation/test
    Split(SplitArgs),
    /// Check that every image sits under its label's directory
    Audit(AuditArgs),
    /// Organize, split, audit and report in one go
    Run(RunArgs),
    /// Write the effective configuration as JSON
    InitConfig(InitConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct MetadataArgs {
    /// Metadata CSV mapping lesion keys to labels
    #[arg(long, value_name = "CSV")]
    pub metadata: Option<PathBuf>,

    #[arg(long, value_name = "NAME")]
    pub key_column: Option<String>,

    #[arg(long, value_name = "NAME")]
    pub label_column: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PartitionArgs {
    #[arg(long, value_name = "RATIO")]
    pub train: Option<f64>,

    #[arg(long = "val", value_name = "RATIO")]
    pub validation: Option<f64>,

    #[arg(long, value_name = "RATIO")]
    pub test: Option<f64>,

    /// Shuffle seed
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct OrganizeArgs {
    #[command(flatten)]
    pub metadata: MetadataArgs,

    /// Directory containing all images
    #[arg(long, value_name = "DIR")]
    pub images: Option<PathBuf>,

    /// Destination for per-label directories
    #[arg(long, value_name = "DIR")]
    pub organized: Option<PathBuf>,

    /// Move files instead of copying them
    #[arg(long = "move")]
    pub move_files: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SplitArgs {
    #[command(flatten)]
    pub metadata: MetadataArgs,

    #[command(flatten)]
    pub partition: PartitionArgs,

    /// Organized corpus to split
    #[arg(long, value_name = "DIR")]
    pub organized: Option<PathBuf>,

    /// Destination for train/validation/test
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    #[arg(long = "move")]
    pub move_files: bool,

    /// Exit with status 1 if the audit finds misplaced images
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AuditArgs {
    #[command(flatten)]
    pub metadata: MetadataArgs,

    /// Root of the layout to audit
    #[arg(long, value_name = "DIR")]
    pub root: PathBuf,

    /// The root holds train/validation/test sub-directories
    #[arg(long)]
    pub partitioned: bool,

    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub metadata: MetadataArgs,

    #[command(flatten)]
    pub partition: PartitionArgs,

    #[arg(long, value_name = "DIR")]
    pub images: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    pub organized: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    #[arg(long = "move")]
    pub move_files: bool,

    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug, Clone)]
pub struct InitConfigArgs {
    /// Destination file (defaults to the platform config location)
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Replace an existing file
    #[arg(long)]
    pub force: bool,
}

impl MetadataArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(path) = &self.metadata {
            config.metadata_path = path.clone();
        }
        if let Some(key) = &self.key_column {
            config.key_column = key.clone();
        }
        if let Some(label) = &self.label_column {
            config.label_column = label.clone();
        }
    }
}

impl PartitionArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        let current = config.ratios;
        config.ratios = SplitRatios::new(
            self.train.unwrap_or(current.train),
            self.validation.unwrap_or(current.validation),
            self.test.unwrap_or(current.test),
        );
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
    }
}

fn apply_move(move_files: bool, config: &mut PipelineConfig) {
    if move_files {
        config.transfer = TransferMode::Move;
    }
}

impl Cli {
    /// Fold command-line overrides into `config`.
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(dir) = &self.log_dir {
            config.log_dir = dir.clone();
        }
        match &self.command {
            Command::Organize(args) => {
                args.metadata.apply(config);
                if let Some(dir) = &args.images {
                    config.images_dir = dir.clone();
                }
                if let Some(dir) = &args.organized {
                    config.organized_dir = dir.clone();
                }
                apply_move(args.move_files, config);
            }
            Command::Split(args) => {
                args.metadata.apply(config);
                args.partition.apply(config);
                if let Some(dir) = &args.organized {
                    config.organized_dir = dir.clone();
                }
                if let Some(dir) = &args.output {
                    config.split_dir = dir.clone();
                }
                apply_move(args.move_files, config);
            }
            Command::Audit(args) => args.metadata.apply(config),
            Command::Run(args) => {
                args.metadata.apply(config);
                args.partition.apply(config);
                if let Some(dir) = &args.images {
                    config.images_dir = dir.clone();
                }
                if let Some(dir) = &args.organized {
                    config.organized_dir = dir.clone();
                }
                if let Some(dir) = &args.output {
                    config.split_dir = dir.clone();
                }
                apply_move(args.move_files, config);
            }
            Command::InitConfig(_) => {}
        }
    }

    fn strict(&self) -> bool {
        match &self.command {
            Command::Organize(_) | Command::InitConfig(_) => false,
            Command::Split(args) => args.strict,
            Command::Audit(args) => args.strict,
            Command::Run(args) => args.strict,
        }
    }
}

/// How a completed command should exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Clean,
    Misplaced,
}

fn log_organize(outcome: &OrganizeOutcome) {
    info!(
        "Organized {} of {} images ({} errors) into {:?}",
        outcome.result.succeeded,
        outcome.result.processed,
        outcome.result.failed(),
        outcome.layout.root()
    );
}

fn log_audit(report: &AuditReport) -> usize {
    let counts = report.counts();
    if report.cancelled {
        warn!(
            "Audit was cancelled after {} files; the layout is unverified",
            counts.total
        );
    }
    for finding in report.misplaced() {
        error!("Misplaced: {:?}", finding.path);
    }
    if !report.unknown_directories.is_empty() {
        warn!(
            "{} directories matched no known label",
            report.unknown_directories.len()
        );
    }
    counts.incorrect
}

fn print_split(outcome: &SplitRunOutcome) {
    println!("{}", outcome.report.render());
    info!("Report: {:?}", outcome.report_path);
    info!("Manifest: {:?}", outcome.manifest_path);
}

fn write_config(config: &PipelineConfig, args: &InitConfigArgs) -> PipelineResult<()> {
    let path = match &args.output {
        Some(path) => path.clone(),
        None => PipelineConfig::default_config_path().ok_or_else(|| {
            PipelineError::Config("could not determine the platform config directory".to_string())
        })?,
    };
    if path.exists() && !args.force {
        return Err(PipelineError::Config(format!(
            "{:?} already exists; pass --force to replace it",
            path
        )));
    }
    config.save(&path)?;
    println!("Wrote configuration to {:?}", path);
    Ok(())
}

/// Execute the parsed command against a fully resolved configuration.
pub fn execute(cli: &Cli, config: &PipelineConfig) -> PipelineResult<Completion> {
    let control = config.stage_control();
    let misplaced = match &cli.command {
        Command::Organize(_) => {
            let mapping = pipeline::load_mapping(config)?;
            let outcome = pipeline::organize_dataset(config, &mapping, &control)?;
            log_organize(&outcome);
            log_audit(&outcome.audit)
        }
        Command::Split(_) => {
            let mapping = pipeline::load_mapping(config)?;
            let outcome = pipeline::split_dataset(config, &mapping, None, &control)?;
            print_split(&outcome);
            log_audit(&outcome.audit)
        }
        Command::Audit(args) => {
            let mapping = pipeline::load_mapping(config)?;
            let report =
                pipeline::audit_dataset(config, &mapping, &args.root, args.partitioned, &control)?;
            let counts = report.counts();
            println!(
                "Validation complete: {}/{} correct, {} incorrect, {} errors",
                counts.correct,
                counts.total,
                counts.incorrect,
                counts.errors()
            );
            log_audit(&report)
        }
        Command::Run(_) => {
            let outcome = pipeline::run(config, &control)?;
            log_organize(&outcome.organize);
            print_split(&outcome.split);
            let items = outcome.item_results();
            if outcome.cancelled() {
                warn!(
                    "Run was cancelled: {} queued item operations were not performed",
                    items.unprocessed()
                );
            }
            if items.failed() > 0 {
                warn!(
                    "Run completed with {} item errors; see the report anomalies",
                    items.failed()
                );
            }
            log_audit(&outcome.audit())
        }
        Command::InitConfig(args) => {
            write_config(config, args)?;
            0
        }
    };

    if misplaced > 0 && cli.strict() {
        Ok(Completion::Misplaced)
    } else {
        Ok(Completion::Clean)
    }
}
