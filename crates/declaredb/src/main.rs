//! declaredb CLI
//!
//! Command-line tool for validating and diffing schema descriptions.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use declaredb::prelude::*;

/// Declarative schema reconciliation for relational databases.
#[derive(Parser)]
#[command(name = "declaredb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a schema description.
    Validate {
        /// Path to the schema JSON file.
        schema: PathBuf,
    },

    /// Show the operations needed to migrate one schema into another.
    Diff {
        /// Path to the actual schema JSON file.
        actual: PathBuf,

        /// Path to the desired schema JSON file.
        desired: PathBuf,

        /// Print the operations as JSON instead of descriptions.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Validate { schema } => {
            let schema = load_schema(&schema)?;
            let result = validate(&schema);
            if result.is_valid() {
                info!("schema is valid");
                Ok(ExitCode::SUCCESS)
            } else {
                for error in result.errors() {
                    eprintln!("error: {error}");
                }
                Ok(ExitCode::FAILURE)
            }
        }

        Commands::Diff {
            actual,
            desired,
            json,
        } => {
            let actual = load_schema(&actual)?;
            let desired = load_schema(&desired)?;
            let operations = diff(&desired, &actual)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&operations)?);
            } else if operations.is_empty() {
                info!("schemas are identical");
            } else {
                for operation in &operations {
                    println!("{}", operation.description());
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_schema(path: &Path) -> anyhow::Result<Schema> {
    let text = std::fs::read_to_string(path)?;
    let schema = serde_json::from_str(&text)?;
    Ok(schema)
}
