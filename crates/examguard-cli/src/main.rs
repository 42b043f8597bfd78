//! examguard CLI: take proctored multiple-choice tests from the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use examguard_host::DeviceMode;

mod commands;

#[derive(Parser)]
#[command(name = "examguard", version, about = "Proctored multiple-choice test runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a test
    Take {
        /// Question bank JSON file (overrides the configured source)
        #[arg(long)]
        questions: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Results file (overrides the configured path)
        #[arg(long)]
        results: Option<PathBuf>,

        /// Camera/microphone backend: local, granted, denied
        #[arg(long)]
        devices: Option<DeviceMode>,

        /// Also write the results page as HTML
        #[arg(long)]
        html: Option<PathBuf>,

        /// Also write the results page as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Validate a question bank file
    Validate {
        /// Path to the question bank JSON file
        #[arg(long)]
        questions: PathBuf,
    },

    /// Show stored results
    Results {
        /// Results file (overrides the configured path)
        #[arg(long)]
        results: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Only show this test
        #[arg(long)]
        test_id: Option<String>,

        /// Show every attempt instead of the latest per test
        #[arg(long)]
        all: bool,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create starter config and example question bank
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("examguard=warn".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take {
            questions,
            config,
            results,
            devices,
            html,
            json,
        } => commands::take::execute(questions, config, results, devices, html, json).await,
        Commands::Validate { questions } => commands::validate::execute(questions),
        Commands::Results {
            results,
            config,
            test_id,
            all,
            format,
        } => commands::results::execute(results, config, test_id, all, format).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
