//! Configuration system for modelgrade.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/modelgrade/config.toml` and/or
//! `.modelgrade/config.toml` in the workspace directory.

use crate::combiner::default_weights;
use crate::error::ConfigError;
use crate::evaluator::DEFAULT_MAX_WORKERS;
use crate::gateway::GatewayConfig;
use crate::url::DEFAULT_HUB_HOST;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelgradeConfig {
    pub scoring: ScoringConfig,
    pub hub: HubConfig,
    pub github: GithubConfig,
    pub llm: LlmConfig,
    pub store: StoreConfig,
    pub gateway: GatewayConfig,
}

/// Evaluator and combiner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Overall deadline for one model's evaluation.
    pub timeout_secs: u64,
    /// Metrics evaluated concurrently.
    pub max_workers: usize,
    /// Combiner weight per output field.
    pub weights: BTreeMap<String, f64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            max_workers: DEFAULT_MAX_WORKERS,
            weights: default_weights(),
        }
    }
}

/// Model hub client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    pub base_url: String,
    /// Host used to recognize model URLs (subdomains included).
    pub host: String,
    pub timeout_secs: u64,
    /// Environment variable holding an optional hub token.
    pub token_env: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            base_url: "https://huggingface.co".to_string(),
            host: DEFAULT_HUB_HOST.to_string(),
            timeout_secs: 15,
            token_env: "HF_TOKEN".to_string(),
        }
    }
}

/// Source-host API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    pub api_url: String,
    pub timeout_secs: u64,
    /// Pages of 100 commits fetched per repository.
    pub max_commit_pages: u32,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            timeout_secs: 15,
            max_commit_pages: 8,
        }
    }
}

/// OpenAI-compatible chat endpoint used by the documentation metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "deepseek/deepseek-chat-v3.1:free".to_string(),
            api_key_env: "LLM_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Artifact store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path. `:memory:` keeps everything in process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Configured path, or `modelgrade.db` in the user data directory.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(p) = &self.path {
            return p.clone();
        }
        directories::ProjectDirs::from("dev", "modelgrade", "modelgrade")
            .map(|d| d.data_dir().join("modelgrade.db"))
            .unwrap_or_else(|| PathBuf::from("modelgrade.db"))
    }
}

impl ModelgradeConfig {
    /// Human-readable warnings about suspicious values.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let total: f64 = self.scoring.weights.values().filter(|w| **w > 0.0).sum();
        if total <= 0.0 {
            warnings.push("scoring.weights sum to zero; every net_score will be 0".to_string());
        }
        if self.scoring.weights.values().any(|w| *w < 0.0) {
            warnings.push("scoring.weights contains negative weights; they are ignored".to_string());
        }
        if self.scoring.max_workers == 0 {
            warnings.push("scoring.max_workers is 0; one worker will be used".to_string());
        }
        if self.scoring.timeout_secs == 0 {
            warnings.push("scoring.timeout_secs is 0; every metric will time out".to_string());
        }
        if self.hub.host.trim().is_empty() {
            warnings.push("hub.host is empty; no URL will be recognized as a model".to_string());
        }
        warnings
    }
}

/// Load configuration from layered sources.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ModelgradeConfig>,
) -> Result<ModelgradeConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(ModelgradeConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "modelgrade", "modelgrade") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".modelgrade").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (MODELGRADE_SCORING__TIMEOUT_SECS, MODELGRADE_GATEWAY__PORT, etc.)
    figment = figment.merge(Env::prefixed("MODELGRADE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Load configuration from a single explicit TOML file layered over defaults.
pub fn load_config_file(path: &Path) -> Result<ModelgradeConfig, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Figment::from(Serialized::defaults(ModelgradeConfig::default()))
        .merge(Toml::file(path))
        .extract()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".modelgrade").join("config.toml")
}
