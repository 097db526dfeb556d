//! # brAIn CLI (`brain`)
//!
//! Starts, probes, and feeds the brAIn knowledge service container.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `brain open` | (Re)start the service and wait until its web UI answers |
//! | `brain ingest` | Run a one-shot ingestion of the vault |
//! | `brain doctor` | Check that docker is installed and an API key is set |
//! | `brain settings show` | Print the stored settings (key masked) |
//! | `brain settings set-api-key <KEY>` | Store the OpenAI API key |
//!
//! ## Examples
//!
//! ```bash
//! brain settings set-api-key sk-...
//! brain ingest --vault ~/notes
//! brain open --vault ~/notes --report human
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use brain::commands;
use brain::config;
use brain::report::ReportMode;

/// Chat with your notes through a locally running brAIn container.
///
/// Reads `./config/brain.toml` by default; every setting has a default, so
/// the file is optional.
#[derive(Parser)]
#[command(
    name = "brain",
    about = "Run the brAIn knowledge service container next to your notes",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/brain.toml")]
    config: PathBuf,

    /// Progress output on stderr: `auto`, `human`, `json`, or `off`.
    ///
    /// `auto` is human when stderr is a terminal, off otherwise. Notices
    /// are printed regardless.
    #[arg(long, global = true, default_value = "auto")]
    report: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive service and wait for it to become reachable.
    ///
    /// Removes any existing container, starts a fresh one with the vault
    /// mounted, then polls the endpoint. Prints the URL on success; exits
    /// non-zero when the service never answered.
    Open {
        /// Vault directory to mount (overrides `[vault].path`).
        #[arg(long)]
        vault: Option<PathBuf>,
    },

    /// Ingest the vault's documents with a one-shot container.
    ///
    /// Stops the interactive service if it is running.
    Ingest {
        /// Vault directory to mount (overrides `[vault].path`).
        #[arg(long)]
        vault: Option<PathBuf>,
    },

    /// Check that the container runtime is installed and an API key is set.
    Doctor,

    /// Show or edit the stored settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the settings file location and the masked API key.
    Show,
    /// Store the OpenAI API key. An empty value clears it.
    SetApiKey {
        key: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mode = ReportMode::parse(&cli.report)?;
    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Open { vault } => commands::run_open(&cfg, vault.as_deref(), mode).await,
        Commands::Ingest { vault } => commands::run_ingest(&cfg, vault.as_deref(), mode).await,
        Commands::Doctor => commands::run_doctor(&cfg, mode).await,
        Commands::Settings { action } => match action {
            SettingsAction::Show => commands::run_settings_show(&cfg),
            SettingsAction::SetApiKey { key } => commands::run_settings_set_api_key(&cfg, &key),
        },
    }
}
