//! CCW Pipeline - RIF ingestion entry point

use anyhow::{Context, Result};
use ccw_common::logging::{init_logging, LogConfig, LogLevel};
use ccw_pipeline::commands::{compare, parse, run};
use ccw_pipeline::{Cli, Commands, PipelineConfig};
use ccw_rif::ExtractionOptions;
use clap::Parser;
use std::time::Duration;
use tracing::error;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = match (&cli.command, cli.verbose) {
        (_, true) => LogLevel::Debug,
        (Commands::Run { .. }, false) => LogLevel::Info,
        (_, false) => LogLevel::Warn,
    };
    let log_config = LogConfig::builder()
        .level(level)
        .log_file_prefix("ccw-pipeline")
        .build();

    // LOG_* variables take precedence over the flags
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);
    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        },
    };

    if let Err(e) = execute_command(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn execute_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            once,
            interval_secs,
            local_dir,
            dry_run,
        } => {
            let config = PipelineConfig::from_env().context("Failed to load pipeline configuration")?;
            let options = run::RunOptions {
                once,
                interval: interval_secs.map(Duration::from_secs),
                local_dir,
                dry_run,
            };
            run::run(config, options).await
        },
        Commands::Parse { file_type, path } => {
            let options = ExtractionOptions::from_env().context("Failed to load extraction options")?;
            parse::run(&path, file_type, options.strict_grouping)
        },
        Commands::Compare {
            file_type,
            delimited,
            parquet,
        } => {
            let options = ExtractionOptions::from_env().context("Failed to load extraction options")?;
            compare::run(file_type, &delimited, &parquet, options.strict_grouping)
        },
    }
}
