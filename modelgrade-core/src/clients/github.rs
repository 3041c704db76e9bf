//! Source-host (GitHub REST v3) client.
//!
//! The token is read from `GITHUB_TOKEN`, falling back to `GH_TOKEN`.
//! Placeholder values are ignored. A request rejected with bad credentials is
//! retried once without authentication.

use super::{build_http_client, decode_json};
use crate::config::GithubConfig;
use crate::error::ClientError;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

pub const TOKEN_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];
const PLACEHOLDER_TOKENS: [&str; 5] = ["", "invalid", "none", "null", "placeholder"];

/// Repository metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepoInfo {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub network_count: Option<u64>,
    #[serde(default)]
    pub license: Option<RepoLicense>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepoLicense {
    #[serde(default)]
    pub spdx_id: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

impl RepoInfo {
    /// SPDX id of the repository license; `NOASSERTION` counts as unknown.
    pub fn license_id(&self) -> Option<String> {
        let license = self.license.as_ref()?;
        license
            .spdx_id
            .as_deref()
            .filter(|id| !id.eq_ignore_ascii_case("NOASSERTION") && !id.is_empty())
            .or(license.key.as_deref().filter(|k| *k != "other"))
            .map(|id| id.to_ascii_lowercase())
    }

    /// Fork network size, preferring `network_count` when present.
    pub fn network_size(&self) -> u64 {
        self.network_count.unwrap_or(self.forks_count)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub login: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitPerson {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitDetail {
    #[serde(default)]
    pub author: Option<CommitPerson>,
}

/// One entry of `/repos/{o}/{r}/commits`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Commit {
    #[serde(default)]
    pub author: Option<Account>,
    #[serde(default)]
    pub commit: CommitDetail,
}

impl Commit {
    pub fn authored_at(&self) -> Option<DateTime<Utc>> {
        self.commit.author.as_ref()?.date
    }

    /// Stable author identity: account login, else commit email or name.
    pub fn author_key(&self) -> Option<String> {
        if let Some(login) = self.author.as_ref().map(|a| a.login.as_str()).filter(|l| !l.is_empty()) {
            return Some(login.to_ascii_lowercase());
        }
        let person = self.commit.author.as_ref()?;
        person
            .email
            .as_deref()
            .or(person.name.as_deref())
            .filter(|s| !s.is_empty())
            .map(str::to_ascii_lowercase)
    }

    pub fn is_bot(&self) -> bool {
        if let Some(account) = &self.author {
            if account.kind.as_deref() == Some("Bot") {
                return true;
            }
            if is_bot_name(&account.login) {
                return true;
            }
        }
        self.commit
            .author
            .as_ref()
            .and_then(|p| p.name.as_deref())
            .is_some_and(is_bot_name)
    }
}

/// `/repos/{o}/{r}/contributors` entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Contributor {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub contributions: u64,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl Contributor {
    pub fn is_bot(&self) -> bool {
        self.kind.as_deref() == Some("Bot") || self.login.as_deref().is_some_and(is_bot_name)
    }
}

/// `/repos/{o}/{r}/pulls` entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

fn is_bot_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with("[bot]") || lower.ends_with("-bot") || lower == "dependabot" || lower == "github-actions"
}

/// Token from the environment, ignoring placeholder values.
pub fn token_from_env() -> Option<String> {
    TOKEN_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|t| t.trim().to_string())
        .find(|t| !PLACEHOLDER_TOKENS.contains(&t.to_ascii_lowercase().as_str()))
}

/// `rel="next"` target of a `Link` header.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| p.trim() == "rel=\"next\"");
        if is_next {
            Some(target.trim_start_matches('<').trim_end_matches('>').to_string())
        } else {
            None
        }
    })
}

#[derive(Debug, Clone)]
pub struct GithubClient {
    client: Client,
    api_url: String,
    token: Option<String>,
    max_commit_pages: u32,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Self {
        Self {
            client: build_http_client(config.timeout_secs),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: token_from_env(),
            max_commit_pages: config.max_commit_pages.max(1),
        }
    }

    /// Client against an explicit API URL with an explicit token.
    pub fn with_api_url(api_url: &str, token: Option<String>, timeout_secs: u64) -> Self {
        Self {
            client: build_http_client(timeout_secs),
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
            max_commit_pages: 8,
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// GET with auth, retrying anonymously when the token is rejected.
    /// Returns the decoded body and the next-page link.
    async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<(T, Option<String>), ClientError> {
        let mut use_token = self.token.is_some();
        loop {
            let mut req = self
                .client
                .get(url)
                .header("Accept", "application/vnd.github+json");
            if use_token
                && let Some(token) = &self.token
            {
                req = req.bearer_auth(token);
            }
            debug!(url = %url, authenticated = use_token, "GitHub request");
            let response = req
                .send()
                .await
                .map_err(|e| ClientError::from_reqwest(url, e))?;
            let status = response.status();
            if use_token && matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                let body = response.text().await.unwrap_or_default();
                if status == StatusCode::UNAUTHORIZED || body.to_ascii_lowercase().contains("bad credentials") {
                    warn!(url = %url, "GitHub rejected token, retrying without auth");
                    use_token = false;
                    continue;
                }
                return Err(ClientError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            if !status.is_success() {
                return Err(ClientError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            let next = response
                .headers()
                .get(reqwest::header::LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(next_link);
            let body = decode_json(response, url).await?;
            return Ok((body, next));
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        self.get_page(url).await.map(|(body, _)| body)
    }

    pub async fn repo(&self, owner: &str, repo: &str) -> Result<RepoInfo, ClientError> {
        let url = format!("{}/repos/{}/{}", self.api_url, owner, repo);
        self.get_json(&url).await
    }

    /// Commits since `since`, following pagination up to the configured page cap.
    pub async fn commits_since(
        &self,
        owner: &str,
        repo: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Commit>, ClientError> {
        let mut url = Some(format!(
            "{}/repos/{}/{}/commits?per_page=100&since={}",
            self.api_url,
            owner,
            repo,
            since.format("%Y-%m-%dT%H:%M:%SZ")
        ));
        let mut commits = Vec::new();
        let mut pages = 0;
        while let Some(current) = url.take() {
            if pages >= self.max_commit_pages {
                break;
            }
            let (page, next): (Vec<Commit>, _) = self.get_page(&current).await?;
            pages += 1;
            if page.is_empty() {
                break;
            }
            commits.extend(page);
            url = next;
        }
        Ok(commits)
    }

    pub async fn contributors(&self, owner: &str, repo: &str) -> Result<Vec<Contributor>, ClientError> {
        let url = format!(
            "{}/repos/{}/{}/contributors?per_page=100&anon=1",
            self.api_url, owner, repo
        );
        self.get_json(&url).await
    }

    /// Blob paths of the default branch, recursively.
    pub async fn tree_files(&self, owner: &str, repo: &str) -> Result<Vec<String>, ClientError> {
        let info = self.repo(owner, repo).await?;
        let branch = info.default_branch.unwrap_or_else(|| "main".to_string());
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_url, owner, repo, branch
        );
        let tree: TreeResponse = self.get_json(&url).await?;
        Ok(tree
            .tree
            .into_iter()
            .filter(|e| e.kind == "blob")
            .map(|e| e.path)
            .collect())
    }

    pub async fn closed_pulls(&self, owner: &str, repo: &str) -> Result<Vec<PullRequest>, ClientError> {
        let url = format!(
            "{}/repos/{}/{}/pulls?state=closed&per_page=100",
            self.api_url, owner, repo
        );
        self.get_json(&url).await
    }

    /// Number of reviews submitted on a pull request.
    pub async fn review_count(&self, owner: &str, repo: &str, number: u64) -> Result<usize, ClientError> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/reviews",
            self.api_url, owner, repo, number
        );
        let reviews: Vec<serde_json::Value> = self.get_json(&url).await?;
        Ok(reviews.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_next_link() {
        let header = r#"<https://api.github.com/repositories/1/commits?page=2>; rel="next", <https://api.github.com/repositories/1/commits?page=5>; rel="last""#;
        assert_eq!(
            next_link(header).as_deref(),
            Some("https://api.github.com/repositories/1/commits?page=2")
        );
        assert_eq!(next_link(r#"<https://x/?page=1>; rel="prev""#), None);
    }

    #[test]
    fn test_commit_author_and_bots() {
        let human: Commit = serde_json::from_value(json!({
            "author": {"login": "Alice", "type": "User"},
            "commit": {"author": {"name": "Alice", "email": "a@example.com"}}
        }))
        .unwrap();
        assert_eq!(human.author_key().as_deref(), Some("alice"));
        assert!(!human.is_bot());

        let bot: Commit = serde_json::from_value(json!({
            "author": {"login": "dependabot[bot]", "type": "Bot"},
            "commit": {"author": {"name": "dependabot[bot]"}}
        }))
        .unwrap();
        assert!(bot.is_bot());

        let anonymous: Commit = serde_json::from_value(json!({
            "author": null,
            "commit": {"author": {"name": "Bob", "email": "BOB@example.com"}}
        }))
        .unwrap();
        assert_eq!(anonymous.author_key().as_deref(), Some("bob@example.com"));
    }

    #[test]
    fn test_repo_license_id() {
        let info: RepoInfo = serde_json::from_value(json!({
            "license": {"spdx_id": "Apache-2.0", "key": "apache-2.0"}
        }))
        .unwrap();
        assert_eq!(info.license_id().as_deref(), Some("apache-2.0"));

        let unknown: RepoInfo = serde_json::from_value(json!({
            "license": {"spdx_id": "NOASSERTION", "key": "other"}
        }))
        .unwrap();
        assert_eq!(unknown.license_id(), None);
    }

    #[tokio::test]
    async fn test_commits_follow_pagination() {
        let server = MockServer::start().await;
        let page2 = format!("{}/page2", server.uri());
        Mock::given(method("GET"))
            .and(path("/repos/o/r/commits"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", format!("<{page2}>; rel=\"next\"").as_str())
                    .set_body_json(json!([{"author": {"login": "a"}, "commit": {}}])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"author": {"login": "b"}, "commit": {}}])),
            )
            .mount(&server)
            .await;

        let client = GithubClient::with_api_url(&server.uri(), None, 5);
        let commits = client.commits_since("o", "r", Utc::now()).await.unwrap();
        assert_eq!(commits.len(), 2);
    }

    #[tokio::test]
    async fn test_bad_credentials_retry_anonymously() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/o/r"))
            .and(header("authorization", "Bearer stale"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/o/r"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "full_name": "o/r",
                "default_branch": "main",
                "forks_count": 3
            })))
            .mount(&server)
            .await;

        let client = GithubClient::with_api_url(&server.uri(), Some("stale".into()), 5);
        let info = client.repo("o", "r").await.unwrap();
        assert_eq!(info.full_name, "o/r");
        assert_eq!(info.network_size(), 3);
    }

    #[tokio::test]
    async fn test_tree_files_lists_blobs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/o/r"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"default_branch": "dev"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/o/r/git/trees/dev"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tree": [
                    {"path": "src", "type": "tree"},
                    {"path": "src/train.py", "type": "blob"},
                    {"path": "requirements.txt", "type": "blob"}
                ]
            })))
            .mount(&server)
            .await;

        let client = GithubClient::with_api_url(&server.uri(), None, 5);
        let files = client.tree_files("o", "r").await.unwrap();
        assert_eq!(files, vec!["src/train.py", "requirements.txt"]);
    }
}
