//! CCW Pipeline
//!
//! Operator-facing entry point for RIF ingestion:
//!
//! - **Run**: poll the bucket (or a local directory) for data sets and load them (`ccw-pipeline run`)
//! - **Parse**: parse one local RIF file and count its records (`ccw-pipeline parse`)
//! - **Compare**: check that a delimited and a Parquet file hold the same records (`ccw-pipeline compare`)
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod commands;
pub mod config;
pub mod listener;

pub use config::PipelineConfig;
pub use listener::{LoadTotals, LoaderListener};

use ccw_rif::RifFileType;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CCW RIF ingestion pipeline
#[derive(Parser, Debug)]
#[command(name = "ccw-pipeline")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll for data sets and load them
    Run {
        /// Stop after a single poll cycle
        #[arg(long)]
        once: bool,

        /// Seconds between poll cycles (overrides CCW_RIF_RUN_INTERVAL_SECS)
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Read data sets from a local directory instead of S3
        #[arg(long)]
        local_dir: Option<PathBuf>,

        /// Load into memory only, never into the database
        #[arg(long)]
        dry_run: bool,
    },

    /// Parse a local RIF file and print record counts per action
    Parse {
        /// RIF file type, e.g. CARRIER
        #[arg(long, value_parser = parse_file_type)]
        file_type: RifFileType,

        /// File to parse; `.parquet` files are read as columnar
        path: PathBuf,
    },

    /// Compare the records of a delimited file with those of a Parquet file
    Compare {
        /// RIF file type of both files
        #[arg(long, value_parser = parse_file_type)]
        file_type: RifFileType,

        /// Delimited file
        delimited: PathBuf,

        /// Parquet file
        parquet: PathBuf,
    },
}

fn parse_file_type(value: &str) -> Result<RifFileType, String> {
    value.parse().map_err(|e: ccw_rif::RifError| e.to_string())
}
