use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info};

use lesion_split::cli::{self, Cli, Completion};
use lesion_split::config::PipelineConfig;
use lesion_split::infrastructure::logging::{level_for, setup_logging};
use lesion_split::PipelineError;

fn fail(err: &PipelineError) -> ExitCode {
    error!("[{}] {}", err.category(), err);
    ExitCode::from(err.exit_code())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (mut config, source) = match PipelineConfig::load(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("error [{}]: {}", err.category(), err);
            return ExitCode::from(err.exit_code());
        }
    };
    cli.apply(&mut config);

    if let Err(err) = setup_logging(&config.log_dir, level_for(cli.verbose, cli.quiet)) {
        eprintln!("error [{}]: {}", err.category(), err);
        return ExitCode::from(err.exit_code());
    }
    info!("Starting lesion-split v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration {}", source);
    debug!("Effective configuration: {:?}", config);

    match cli::execute(&cli, &config) {
        Ok(Completion::Clean) => {
            info!("Done");
            ExitCode::SUCCESS
        }
        Ok(Completion::Misplaced) => {
            error!("Audit found misplaced images");
            ExitCode::from(1)
        }
        Err(err) => fail(&err),
    }
}
