// SPDX-License-Identifier: MPL-2.0

use clap::{Parser, Subcommand};
use facetrack_fts::cli;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "facetrack-fts")]
#[command(about = "Multi-camera face tracking and attendance service")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file (overrides FTS_CONFIG)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe local devices and the configured/detected subnet for cameras
    Discover {
        /// Overall discovery deadline in seconds
        #[arg(long, default_value = "10")]
        deadline_secs: u64,
    },

    /// Enroll an employee from a still image containing exactly one face
    Enroll {
        /// Employee id to register
        employee_id: String,

        /// Path to a still image (PNG/JPEG) containing the employee's face
        image: PathBuf,
    },

    /// Start the service and run until interrupted
    Start,

    /// Print the current status of a running instance's configuration and
    /// identity index without starting any camera pipelines
    Status,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let args = Cli::parse();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        match args.command {
            Commands::Discover { deadline_secs } => cli::discover(args.config.as_deref(), deadline_secs).await,
            Commands::Enroll { employee_id, image } => {
                cli::enroll(args.config.as_deref(), &employee_id, &image).await
            }
            Commands::Start => cli::start(args.config.as_deref()).await,
            Commands::Status => cli::status(args.config.as_deref()).await,
        }
    })
}
