//! fluenta CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "fluenta", version, about = "Adaptive English proficiency testing engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a full assessment session against an item bank
    Simulate {
        /// Path to a .toml item bank or a directory of banks
        #[arg(long)]
        bank: PathBuf,

        /// True ability of the simulated candidate on the logit scale
        #[arg(long, default_value = "0.0")]
        theta: f64,

        /// Claimed CEFR level seeding the ability prior (e.g. "B1")
        #[arg(long)]
        level: Option<String>,

        /// Candidate identifier
        #[arg(long, default_value = "simulated")]
        candidate: String,

        /// Output directory for the session snapshot and report
        #[arg(long, default_value = "./fluenta-results")]
        output: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate item bank TOML files
    Validate {
        /// Path to a bank file or directory
        #[arg(long)]
        bank: PathBuf,
    },

    /// Render the report for a persisted session
    Report {
        /// Directory of persisted session snapshots
        #[arg(long, default_value = "./fluenta-sessions")]
        sessions: PathBuf,

        /// Session id
        #[arg(long)]
        session: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create a starter config and example item bank
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fluenta=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Simulate {
            bank,
            theta,
            level,
            candidate,
            output,
            config,
        } => commands::simulate::execute(bank, theta, level, candidate, output, config).await,
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::Report {
            sessions,
            session,
            format,
        } => commands::report::execute(sessions, session, format).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
