//! Gateway authentication.

use super::GatewayConfig;
use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Header carrying the access token on mutating requests.
pub const AUTH_HEADER: &str = "x-authorization";

/// Lifetime of a token handed out by `/authenticate`.
pub const ISSUED_TOKEN_TTL: Duration = Duration::from_secs(10 * 60 * 60);
/// Most issued tokens held at once; the oldest is dropped beyond this.
pub const MAX_ISSUED_TOKENS: usize = 1024;

/// Token-based authentication for mutating routes.
///
/// Configured tokens never expire. Tokens handed out by `/authenticate` live
/// in memory for [`ISSUED_TOKEN_TTL`] and at most [`MAX_ISSUED_TOKENS`] are kept.
#[derive(Debug)]
pub struct GatewayAuth {
    valid_tokens: Vec<String>,
    /// Issued tokens, oldest first.
    issued: RwLock<VecDeque<(String, Instant)>>,
    ttl: Duration,
}

impl Default for GatewayAuth {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl GatewayAuth {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.auth_tokens.clone())
    }

    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            valid_tokens: tokens.into_iter().filter(|t| !t.trim().is_empty()).collect(),
            issued: RwLock::new(VecDeque::new()),
            ttl: ISSUED_TOKEN_TTL,
        }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Whether no tokens are configured (every request is accepted).
    pub fn is_open_mode(&self) -> bool {
        self.valid_tokens.is_empty()
    }

    /// Validate a raw header value; a leading `bearer ` is ignored.
    pub fn validate(&self, header_value: &str) -> bool {
        if self.is_open_mode() {
            return true;
        }
        let token = strip_bearer(header_value);
        if token.is_empty() {
            return false;
        }
        self.valid_tokens.iter().any(|t| constant_time_eq(t, token))
            || self
                .issued
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .any(|(t, issued_at)| t == token && issued_at.elapsed() < self.ttl)
    }

    /// Issue a fresh token for `password`. In protected mode the password must
    /// be one of the configured tokens and the token is remembered; in open
    /// mode nothing is stored since every request passes anyway.
    pub fn issue(&self, password: &str) -> Option<String> {
        let token = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        if self.is_open_mode() {
            return Some(token);
        }
        if !self.valid_tokens.iter().any(|t| constant_time_eq(t, password)) {
            return None;
        }

        let mut issued = self.issued.write().unwrap_or_else(PoisonError::into_inner);
        while issued
            .front()
            .is_some_and(|(_, issued_at)| issued_at.elapsed() >= self.ttl)
        {
            issued.pop_front();
        }
        while issued.len() >= MAX_ISSUED_TOKENS {
            issued.pop_front();
        }
        issued.push_back((token.clone(), Instant::now()));
        Some(token)
    }

    pub fn token_count(&self) -> usize {
        self.valid_tokens.len()
    }

    /// Issued tokens currently held, expired ones included until the next issue.
    pub fn issued_count(&self) -> usize {
        self.issued
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn strip_bearer(value: &str) -> &str {
    let value = value.trim();
    match value.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => value[7..].trim(),
        _ => value,
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_tokens_with_and_without_bearer() {
        let auth = GatewayAuth::new(vec!["grader-a".into(), "grader-b".into()]);
        assert!(auth.validate("grader-a"));
        assert!(auth.validate("  Bearer grader-b "));
        assert!(!auth.validate("grader-c"));
        assert!(!auth.validate("bearer "));
    }

    #[test]
    fn test_no_tokens_means_every_request_passes() {
        let auth = GatewayAuth::new(Vec::new());
        assert!(auth.validate("whatever"));
        assert!(auth.issue("any password").is_some());
        assert_eq!(auth.issued_count(), 0);
        // Whitespace-only entries do not switch protection on.
        assert!(GatewayAuth::new(vec!["  ".into()]).is_open_mode());
    }

    #[test]
    fn test_authenticate_flow_issues_usable_token() {
        let auth = GatewayAuth::new(vec!["s3cret".into()]);
        assert_eq!(auth.issue("guess"), None);
        let token = auth.issue("s3cret").unwrap();
        assert_eq!(token.len(), 64);
        assert!(auth.validate(&format!("bearer {token}")));
        assert!(!auth.validate(&token[..32]));
    }

    #[test]
    fn test_issued_tokens_expire() {
        let auth = GatewayAuth::new(vec!["s3cret".into()]).with_token_ttl(Duration::ZERO);
        let stale = auth.issue("s3cret").unwrap();
        assert!(!auth.validate(&stale));

        // The next issue drops the expired entry.
        auth.issue("s3cret").unwrap();
        assert_eq!(auth.issued_count(), 1);
    }

    #[test]
    fn test_issued_tokens_are_capped() {
        let auth = GatewayAuth::new(vec!["s3cret".into()]);
        let first = auth.issue("s3cret").unwrap();
        for _ in 0..MAX_ISSUED_TOKENS {
            auth.issue("s3cret").unwrap();
        }
        assert_eq!(auth.issued_count(), MAX_ISSUED_TOKENS);
        assert!(!auth.validate(&first));
        assert!(auth.validate("s3cret"));
    }

    #[test]
    fn test_tokens_read_from_gateway_config() {
        let mut config = GatewayConfig::default();
        config.auth_tokens = vec!["one".into(), "".into(), "two".into()];
        let auth = GatewayAuth::from_config(&config);
        assert_eq!(auth.token_count(), 2);
        assert!(!auth.is_open_mode());
    }

    #[test]
    fn test_token_comparison_length_and_content() {
        assert!(constant_time_eq("grader", "grader"));
        assert!(!constant_time_eq("grader", "grades"));
        assert!(!constant_time_eq("grader", "grader-a"));
    }
}
