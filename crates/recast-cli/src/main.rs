//! Recast CLI
//!
//! Validates and normalizes JSON records against YAML schema documents.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Recast - schema-driven record validation
#[derive(Parser)]
#[command(name = "recast")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every record of a JSON or JSONL file
    Check {
        /// Schema document file or directory
        #[arg(short, long, default_value = "schemas")]
        schemas: String,

        /// Model to validate against
        #[arg(short, long)]
        model: String,

        /// Input file (.json or .jsonl)
        input: String,
    },

    /// Validate records and write their normalized JSON
    Convert {
        /// Schema document file or directory
        #[arg(short, long, default_value = "schemas")]
        schemas: String,

        /// Model to validate against
        #[arg(short, long)]
        model: String,

        /// Input file (.json or .jsonl)
        input: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// Omit null values
        #[arg(long)]
        exclude_none: bool,

        /// Write a pretty-printed JSON array instead of JSONL
        #[arg(long)]
        pretty: bool,
    },

    /// Show the field layout of loaded schemas
    Inspect {
        /// Schema document file or directory
        #[arg(short, long, default_value = "schemas")]
        schemas: String,

        /// Show a single model only
        #[arg(short, long)]
        model: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Check {
            schemas,
            model,
            input,
        } => {
            commands::check::run(&schemas, &model, &input)?;
        }
        Commands::Convert {
            schemas,
            model,
            input,
            output,
            exclude_none,
            pretty,
        } => {
            commands::convert::run(
                &schemas,
                &model,
                &input,
                output.as_deref(),
                exclude_none,
                pretty,
            )?;
        }
        Commands::Inspect { schemas, model } => {
            commands::inspect::run(&schemas, model.as_deref())?;
        }
    }

    Ok(())
}
