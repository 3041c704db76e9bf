//! # HTTP Gateway
//!
//! REST surface over the scoring engine and the artifact store: rating,
//! artifact CRUD and search, ingestion with lineage extraction, cost and
//! license checks. Mutating routes are guarded by [`GatewayAuth`].

mod auth;
mod handlers;
mod server;

pub use auth::{AUTH_HEADER, GatewayAuth};
pub use server::{ApiError, GatewayState, SharedState, router as gateway_router, run as run_gateway};

use serde::{Deserialize, Serialize};

/// Configuration for the HTTP gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Whether `serve` may start the gateway.
    pub enabled: bool,
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Tokens accepted in `X-Authorization`. Empty means open mode.
    pub auth_tokens: Vec<String>,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8080,
            auth_tokens: Vec::new(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl GatewayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_config_default() {
        let config = GatewayConfig::default();
        assert!(config.enabled);
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert!(config.auth_tokens.is_empty());
        assert_eq!(config.max_body_bytes, 1_048_576);
    }

    #[test]
    fn test_gateway_config_partial_toml() {
        let config: GatewayConfig = toml::from_str("port = 9090\nauth_tokens = [\"t\"]").unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.auth_tokens, vec!["t"]);
    }
}
