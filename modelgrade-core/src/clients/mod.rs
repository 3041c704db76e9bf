//! HTTP clients for the model hub, the source host, and the LLM endpoint.
//!
//! Every client is built with a request timeout so a metric waiting on an
//! upstream service cannot outlive the evaluation deadline by much.

pub mod github;
pub mod hub;
pub mod llm;

pub use github::{Commit, Contributor, GithubClient, PullRequest, RepoInfo};
pub use hub::{DatasetInfo, HubClient, ModelInfo, Sibling};
pub use llm::LlmClient;

use crate::error::ClientError;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("modelgrade/", env!("CARGO_PKG_VERSION"));

/// Build a reqwest client with the given total request timeout.
pub(crate) fn build_http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Send a request and return the response if its status is a success.
pub(crate) async fn send_checked(req: RequestBuilder, url: &str) -> Result<Response, ClientError> {
    debug!(url = %url, "Sending request");
    let response = req
        .send()
        .await
        .map_err(|e| ClientError::from_reqwest(url, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

/// Decode a successful response body as JSON.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    response: Response,
    url: &str,
) -> Result<T, ClientError> {
    let body = response
        .text()
        .await
        .map_err(|e| ClientError::from_reqwest(url, e))?;
    serde_json::from_str(&body).map_err(|e| ClientError::ResponseParse {
        url: url.to_string(),
        message: e.to_string(),
    })
}
