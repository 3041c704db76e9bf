//! Model hub metadata client.

use super::{build_http_client, decode_json, send_checked};
use crate::config::HubConfig;
use crate::error::ClientError;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

/// Extensions counted as model weight files.
pub const WEIGHT_EXTENSIONS: [&str; 6] = [".safetensors", ".bin", ".onnx", ".tflite", ".h5", ".pt"];

/// One file in a hub repository.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sibling {
    pub rfilename: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl Sibling {
    pub fn is_weight_file(&self) -> bool {
        let name = self.rfilename.to_ascii_lowercase();
        WEIGHT_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
    }
}

/// Subset of `/api/models/{id}` used by the metrics.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub siblings: Vec<Sibling>,
    #[serde(default)]
    pub card_data: Option<Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub spaces: Vec<String>,
    #[serde(default, rename = "model-index")]
    pub model_index: Option<Value>,
}

impl ModelInfo {
    /// String field of the model card metadata.
    pub fn card_str(&self, key: &str) -> Option<&str> {
        self.card_data.as_ref()?.get(key)?.as_str()
    }

    /// Card field that may be a string or a list of strings.
    pub fn card_list(&self, key: &str) -> Vec<String> {
        match self.card_data.as_ref().and_then(|c| c.get(key)) {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Total size of weight files in bytes.
    pub fn weight_bytes(&self) -> u64 {
        self.siblings
            .iter()
            .filter(|s| s.is_weight_file())
            .filter_map(|s| s.size)
            .sum()
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.siblings.iter().map(|s| s.rfilename.as_str())
    }

    /// `model-index` from the top level or from the card metadata.
    pub fn model_index(&self) -> Option<&Value> {
        self.model_index
            .as_ref()
            .or_else(|| self.card_data.as_ref()?.get("model-index"))
            .filter(|v| !v.is_null())
    }
}

/// Subset of `/api/datasets/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub card_data: Option<Value>,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub viewer: Option<bool>,
}

impl DatasetInfo {
    pub fn has_card(&self) -> bool {
        self.card_data
            .as_ref()
            .is_some_and(|c| c.as_object().is_some_and(|o| !o.is_empty()))
    }

    /// Explicit `viewer` flag, falling back to the card's `viewer` entry.
    pub fn has_viewer(&self) -> bool {
        self.viewer.unwrap_or_else(|| {
            self.card_data
                .as_ref()
                .and_then(|c| c.get("viewer"))
                .and_then(Value::as_bool)
                .unwrap_or(false)
        })
    }

    pub fn has_configs(&self) -> bool {
        self.card_data
            .as_ref()
            .and_then(|c| c.get("configs"))
            .and_then(Value::as_array)
            .is_some_and(|a| !a.is_empty())
    }
}

/// Client for the hub's REST API and raw file endpoints.
#[derive(Debug, Clone)]
pub struct HubClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HubClient {
    pub fn new(config: &HubConfig) -> Self {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self {
            client: build_http_client(config.timeout_secs),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Client against an explicit base URL with no token.
    pub fn with_base_url(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            client: build_http_client(timeout_secs),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self.client.get(url);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    pub async fn model_info(&self, repo_id: &str) -> Result<ModelInfo, ClientError> {
        let url = format!("{}/api/models/{}?blobs=true", self.base_url, repo_id);
        let response = send_checked(self.get(&url), &url).await?;
        decode_json(response, &url).await
    }

    pub async fn dataset_info(&self, dataset_id: &str) -> Result<DatasetInfo, ClientError> {
        let url = format!("{}/api/datasets/{}", self.base_url, dataset_id);
        let response = send_checked(self.get(&url), &url).await?;
        decode_json(response, &url).await
    }

    /// Raw text of a file on the main revision; `None` when it does not exist.
    pub async fn file_text(
        &self,
        repo_id: &str,
        filename: &str,
    ) -> Result<Option<String>, ClientError> {
        let url = format!("{}/{}/resolve/main/{}", self.base_url, repo_id, filename);
        match send_checked(self.get(&url), &url).await {
            Ok(response) => response
                .text()
                .await
                .map(Some)
                .map_err(|e| ClientError::from_reqwest(&url, e)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn readme(&self, repo_id: &str) -> Result<Option<String>, ClientError> {
        self.file_text(repo_id, "README.md").await
    }

    /// Parsed `config.json`; `None` when absent.
    pub async fn config_json(&self, repo_id: &str) -> Result<Option<Value>, ClientError> {
        let Some(text) = self.file_text(repo_id, "config.json").await? else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ClientError::ResponseParse {
                url: format!("{}/{}/resolve/main/config.json", self.base_url, repo_id),
                message: e.to_string(),
            })
    }
}
