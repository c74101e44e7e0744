//! Tessel CLI — the main entry point.
//!
//! Commands:
//! - `init`   — Write a default config file
//! - `run`    — Run a single task through the agent loop
//! - `tools`  — List the registered tools
//! - `doctor` — Diagnose configuration and environment

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "tessel",
    about = "Tessel — a sandboxed ReAct agent for the terminal",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Run a task to completion
    Run {
        /// The task to accomplish
        task: String,

        /// Override the configured model
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List the registered tools
    Tools,

    /// Diagnose configuration and environment
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Run { task, model } => commands::run::run(task, model).await?,
        Commands::Tools => commands::tools::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
