// Command-line surface of the gpumon binary

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "gpumon")]
#[command(about = "GPU burn-in telemetry: collect samples and reduce recorded runs")]
#[command(version = crate::version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Sample device and host telemetry until interrupted
    Monitor {
        /// Output file; segments are written next to it. Defaults to monitoring.output_path
        output: Option<PathBuf>,
    },

    /// Reduce recorded runs into baseline and stress summaries
    Analyze {
        /// Root directory holding one subdirectory per host
        input: PathBuf,

        /// Only analyze these hosts
        hosts: Vec<String>,
    },

    /// Print the version
    Version,
}
