//! OpenAI-compatible chat completions client.
//!
//! Works with OpenRouter, OpenAI, Ollama, vLLM and any endpoint that follows
//! the chat completions API format.

use super::{build_http_client, decode_json};
use crate::config::LlmConfig;
use crate::error::ClientError;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LlmClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self {
            client: build_http_client(config.timeout_secs),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
        }
    }

    /// Client with explicit endpoint and key.
    pub fn with_endpoint(base_url: &str, model: &str, api_key: Option<String>, timeout_secs: u64) -> Self {
        Self {
            client: build_http_client(timeout_secs),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            api_key_env: "LLM_API_KEY".to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Single-turn completion at temperature 0. Returns the trimmed reply text.
    pub async fn ask(&self, system: &str, user: &str) -> Result<String, ClientError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| ClientError::MissingCredential {
            var: self.api_key_env.clone(),
        })?;
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": 0.0,
            "stream": false,
        });

        debug!(url = %url, model = %self.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&url, e))?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ClientError::AuthFailed {
                service: "llm".to_string(),
            });
        }
        if !status.is_success() {
            return Err(ClientError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let json: Value = decode_json(response, &url).await?;
        json.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| ClientError::ResponseParse {
                url,
                message: "missing choices[0].message.content".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_ask_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": " 0.8 \n"}}]
            })))
            .mount(&server)
            .await;

        let client = LlmClient::with_endpoint(&server.uri(), "m", Some("k".into()), 5);
        assert_eq!(client.ask("sys", "user").await.unwrap(), "0.8");
    }

    #[tokio::test]
    async fn test_missing_key() {
        let client = LlmClient::with_endpoint("http://127.0.0.1:9", "m", None, 5);
        assert!(!client.is_configured());
        let err = client.ask("s", "u").await.unwrap_err();
        assert!(matches!(err, ClientError::MissingCredential { .. }));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let client = LlmClient::with_endpoint(&server.uri(), "m", Some("bad".into()), 5);
        let err = client.ask("s", "u").await.unwrap_err();
        assert!(matches!(err, ClientError::AuthFailed { .. }));
    }

    #[tokio::test]
    async fn test_malformed_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;
        let client = LlmClient::with_endpoint(&server.uri(), "m", Some("k".into()), 5);
        let err = client.ask("s", "u").await.unwrap_err();
        assert!(matches!(err, ClientError::ResponseParse { .. }));
    }
}
