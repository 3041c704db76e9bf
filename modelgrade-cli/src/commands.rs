//! Subcommand handlers.

use crate::input;
use crate::{Commands, ConfigAction};
use modelgrade_core::clients::{GithubClient, HubClient};
use modelgrade_core::config::{ModelgradeConfig, workspace_config_path};
use modelgrade_core::gateway::{GatewayAuth, GatewayState, run_gateway};
use modelgrade_core::{ArtifactStore, MetricRegistry, Orchestrator, ScoreRecord, UrlContextStore};
use modelgrade_metrics::{MetricDeps, register_builtin_metrics};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub const EXIT_SUCCESS: u8 = 0;
/// Exit status for unreadable input files.
pub const EXIT_INPUT_ERROR: u8 = 1;

pub(crate) async fn handle_command(
    command: Commands,
    config: ModelgradeConfig,
    workspace: &Path,
) -> anyhow::Result<u8> {
    match command {
        Commands::Score { file } => handle_score(&file, &config).await,
        Commands::Serve { host, port } => handle_serve(config, host, port).await,
        Commands::Config { action } => handle_config(action, &config, workspace),
    }
}

/// Orchestrator wired with every built-in metric.
pub fn build_orchestrator(config: &ModelgradeConfig) -> Arc<Orchestrator> {
    let context = Arc::new(UrlContextStore::new());
    let registry = Arc::new(MetricRegistry::new());
    register_builtin_metrics(&registry, MetricDeps::from_config(config, context.clone()));
    Arc::new(Orchestrator::from_config(registry, context, config))
}

/// One compact JSON line, keys in record order.
fn render_record(record: &ScoreRecord) -> serde_json::Result<String> {
    serde_json::to_string(record)
}

async fn handle_score(file: &Path, config: &ModelgradeConfig) -> anyhow::Result<u8> {
    let lines = match input::read_url_file(file) {
        Ok(lines) => lines,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", file.display(), e);
            return Ok(EXIT_INPUT_ERROR);
        }
    };
    info!(file = %file.display(), lines = lines.len(), "Scoring URL file");

    let orchestrator = build_orchestrator(config);
    let stdout = std::io::stdout();
    for line in lines {
        let Some(record) = orchestrator
            .score(&line.model, line.code.as_deref(), line.dataset.as_deref())
            .await
        else {
            warn!(url = %line.model, "Skipping non-model URL");
            continue;
        };
        let mut out = stdout.lock();
        writeln!(out, "{}", render_record(&record)?)?;
        out.flush()?;
    }
    Ok(EXIT_SUCCESS)
}

async fn handle_serve(
    mut config: ModelgradeConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<u8> {
    if !config.gateway.enabled {
        anyhow::bail!("The HTTP gateway is disabled (gateway.enabled = false)");
    }
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    let store_path = config.store.resolved_path();
    let store = ArtifactStore::open(&store_path)
        .map_err(|e| anyhow::anyhow!("Failed to open store at {}: {}", store_path.display(), e))?;
    let auth = GatewayAuth::from_config(&config.gateway);
    if auth.is_open_mode() {
        warn!("No gateway auth tokens configured; mutating routes are open");
    }
    let state = GatewayState::new(
        build_orchestrator(&config),
        store,
        HubClient::new(&config.hub),
        GithubClient::new(&config.github),
        auth,
    );

    println!("modelgrade listening on http://{}", config.gateway.bind_addr());
    run_gateway(Arc::new(state), &config.gateway).await?;
    Ok(EXIT_SUCCESS)
}

fn handle_config(
    action: ConfigAction,
    config: &ModelgradeConfig,
    workspace: &Path,
) -> anyhow::Result<u8> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(EXIT_SUCCESS);
            }
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let toml_str = toml::to_string_pretty(&ModelgradeConfig::default())?;
            std::fs::write(&config_path, toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(EXIT_SUCCESS)
        }
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(config)?);
            Ok(EXIT_SUCCESS)
        }
    }
}
