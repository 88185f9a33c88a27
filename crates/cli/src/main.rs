//! Quillwork CLI, the main entry point.
//!
//! Commands:
//! - `locator`        Create or inspect template locators
//! - `component-info` List a template's variables and dialogs
//! - `answers`        Combine answer files through the engine
//! - `assemble`       Run a work session and write the documents
//! - `config`         Show configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "quillwork",
    about = "Quillwork: document assembly against a remote engine",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.quillwork/config.toml)
    #[arg(short, long, global = true, env = "QUILLWORK_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or inspect template locators
    Locator {
        #[command(subcommand)]
        action: commands::locator::LocatorAction,
    },

    /// Show the variables (and optionally dialogs) of a template
    ComponentInfo {
        /// Template locator
        locator: String,

        /// Include dialogs
        #[arg(long)]
        dialogs: bool,
    },

    /// Work with answer files
    Answers {
        #[command(subcommand)]
        action: commands::answers::AnswersAction,
    },

    /// Assemble a template and every template it queues
    Assemble(commands::assemble::AssembleArgs),

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config_cmd::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Locator { action } => commands::locator::run(&config, action)?,
        Commands::ComponentInfo { locator, dialogs } => {
            commands::component_info::run(&config, &locator, dialogs).await?
        }
        Commands::Answers { action } => commands::answers::run(&config, action).await?,
        Commands::Assemble(args) => commands::assemble::run(&config, args).await?,
        Commands::Config { action } => {
            commands::config_cmd::run(&config, cli.config.as_deref(), action)?
        }
    }

    Ok(())
}
