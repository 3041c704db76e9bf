//! modelgrade CLI: score model URLs from a file, or serve the HTTP API.

mod commands;
mod input;

use clap::Parser;
use modelgrade_core::config::{ModelgradeConfig, load_config, load_config_file};
use modelgrade_core::logging::{LogSettings, init_logging};
use std::path::PathBuf;
use std::process::ExitCode;

/// modelgrade: quality scores for machine-learning models
#[derive(Parser, Debug)]
#[command(name = "modelgrade", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (for `.modelgrade/config.toml`)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path, replacing the layered lookup
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Score every model listed in a URL file, one JSON record per line
    Score {
        /// File of `code_url,dataset_url,model_url` lines
        file: PathBuf,
    },
    /// Run the HTTP API
    Serve {
        /// Bind address override
        #[arg(long)]
        host: Option<String>,
        /// Port override
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
}

fn load(cli: &Cli) -> anyhow::Result<ModelgradeConfig> {
    let config = match &cli.config {
        Some(path) => load_config_file(path)?,
        None => load_config(Some(&cli.workspace), None)
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?,
    };
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Usage errors exit with status 2 from here.
    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Serve { .. } => 1,
        _ => 0,
    };
    let _guard = init_logging(&LogSettings::from_env(default_level));

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| cli.workspace.clone());

    let result = match load(&cli) {
        Ok(config) => commands::handle_command(cli.command, config, &workspace).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {e:#}");
            ExitCode::from(commands::EXIT_INPUT_ERROR)
        }
    }
}
