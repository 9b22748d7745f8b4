//! Command-line interface.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod commands;
mod helpers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::document::DocumentType;

#[derive(Parser)]
#[command(name = "docfields")]
#[command(about = "Extract structured fields from W-2s, bank statements, and other documents")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a document and extract its fields
    Process {
        /// PDF, PNG, or JPEG file
        file: PathBuf,

        /// Document type
        #[arg(short = 't', long = "type", value_enum)]
        document_type: DocumentType,

        /// Declared content type (defaults to the file extension's)
        #[arg(long)]
        content_type: Option<String>,

        /// Use a saved analysis response instead of calling the service
        #[arg(long, env = "DOCFIELDS_REPLAY")]
        replay: Option<PathBuf>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize a saved analysis response
    Inspect {
        /// Response JSON (`{"Blocks": [...]}`)
        response: PathBuf,

        /// Also run the extractor for this document type
        #[arg(short = 't', long = "type", value_enum)]
        document_type: Option<DocumentType>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config,

    /// Verify the configured analyzer and profiles
    Check,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load_with(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Process {
            file,
            document_type,
            content_type,
            replay,
            json,
        } => {
            commands::process::cmd_process(
                &config,
                &file,
                document_type,
                content_type.as_deref(),
                replay.as_deref(),
                json,
            )
            .await
        }
        Commands::Inspect {
            response,
            document_type,
            json,
        } => commands::inspect::cmd_inspect(&response, document_type, json).await,
        Commands::Config => commands::config_cmd::cmd_config_show(&config),
        Commands::Check => commands::check::cmd_check(&config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_process() {
        let cli = Cli::try_parse_from([
            "docfields",
            "-v",
            "process",
            "w2.pdf",
            "--type",
            "bank_statement",
            "--json",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Process {
                document_type,
                json,
                ..
            } => {
                assert_eq!(document_type, DocumentType::BankStatement);
                assert!(json);
            }
            _ => panic!("expected process"),
        }
    }

    #[test]
    fn test_rejects_unknown_type() {
        assert!(Cli::try_parse_from(["docfields", "process", "a.pdf", "--type", "invoice"]).is_err());
    }
}
