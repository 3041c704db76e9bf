//! URL classification: model-URL recognition, repository ids, artifact kinds,
//! and validation of user-supplied URLs.

use crate::error::UrlError;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use url::{Host, Url};

/// Default model hub host.
pub const DEFAULT_HUB_HOST: &str = "huggingface.co";
/// Source-code host recognized for code artifacts.
pub const CODE_HOST: &str = "github.com";
/// Longest URL accepted by [`UrlClassifier::validate_model_url`].
pub const MAX_URL_LEN: usize = 2048;

/// First path segments on the hub that never name a model repository.
const RESERVED_SEGMENTS: [&str; 4] = ["datasets", "spaces", "docs", "models"];
/// Path segments that introduce a revision after the repository id.
const REVISION_MARKERS: [&str; 3] = ["tree", "resolve", "blob"];

/// Kind of artifact a URL points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Model,
    Dataset,
    Code,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Model => "model",
            ArtifactKind::Dataset => "dataset",
            ArtifactKind::Code => "code",
        }
    }

    /// Parse a case-insensitive kind name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "model" => Some(ArtifactKind::Model),
            "dataset" => Some(ArtifactKind::Dataset),
            "code" => Some(ArtifactKind::Code),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized repository reference on the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub repo_id: String,
    pub branch: Option<String>,
}

/// Classifies URLs relative to a configured hub host.
#[derive(Debug, Clone)]
pub struct UrlClassifier {
    hub_host: String,
}

impl Default for UrlClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_HUB_HOST)
    }
}

impl UrlClassifier {
    pub fn new(hub_host: impl Into<String>) -> Self {
        Self {
            hub_host: hub_host.into().trim().to_ascii_lowercase(),
        }
    }

    pub fn hub_host(&self) -> &str {
        &self.hub_host
    }

    /// Host equals the hub host or is an enterprise subdomain of it.
    fn is_hub_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        host == self.hub_host || host.ends_with(&format!(".{}", self.hub_host))
    }

    /// Whether `s` names a model repository on the hub.
    pub fn is_model_url(&self, s: &str) -> bool {
        let Some(url) = parse_lenient(s) else {
            return false;
        };
        if !url.host_str().is_some_and(|h| self.is_hub_host(h)) {
            return false;
        }
        match path_segments(&url).first() {
            Some(first) => !RESERVED_SEGMENTS.contains(&first.as_str()),
            None => false,
        }
    }

    /// Repository id and optional branch for a hub URL. Anything that is not a
    /// hub repository URL comes back trimmed, unchanged, with no branch.
    pub fn to_repo_id(&self, s: &str) -> RepoRef {
        let trimmed = s.trim();
        let fallback = RepoRef {
            repo_id: trimmed.to_string(),
            branch: None,
        };
        let Some(url) = parse_lenient(trimmed) else {
            return fallback;
        };
        if !url.host_str().is_some_and(|h| self.is_hub_host(h)) {
            return fallback;
        }
        let segments = path_segments(&url);
        let (repo_id, rest) = match segments.as_slice() {
            [] => return fallback,
            [only] => (only.clone(), &segments[1..]),
            [first, second, ..] if REVISION_MARKERS.contains(&second.as_str()) => {
                (first.clone(), &segments[1..])
            }
            [first, second, ..] => (format!("{first}/{second}"), &segments[2..]),
        };
        let branch = match rest {
            [marker, branch, ..] if REVISION_MARKERS.contains(&marker.as_str()) => {
                Some(branch.clone())
            }
            _ => None,
        };
        RepoRef { repo_id, branch }
    }

    /// Dataset id for a hub dataset URL (`/datasets/<org>/<name>`), or the
    /// trimmed input when it is already a bare id.
    pub fn to_dataset_id(&self, s: &str) -> Option<String> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }
        if !trimmed.contains("://") && !trimmed.contains(&self.hub_host) {
            return Some(trimmed.trim_matches('/').to_string());
        }
        let url = parse_lenient(trimmed)?;
        if !url.host_str().is_some_and(|h| self.is_hub_host(h)) {
            return None;
        }
        let segments = path_segments(&url);
        match segments.as_slice() {
            [d, org, name, ..] if d == "datasets" && !REVISION_MARKERS.contains(&name.as_str()) => {
                Some(format!("{org}/{name}"))
            }
            [d, name, ..] if d == "datasets" => Some(name.clone()),
            _ => None,
        }
    }

    /// Artifact kind from host and path.
    pub fn artifact_kind(&self, s: &str) -> ArtifactKind {
        let Some(url) = parse_lenient(s) else {
            return ArtifactKind::Model;
        };
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if host == CODE_HOST || host.ends_with(&format!(".{CODE_HOST}")) {
            return ArtifactKind::Code;
        }
        if self.is_hub_host(&host)
            && path_segments(&url).first().is_some_and(|s| s == "datasets")
        {
            return ArtifactKind::Dataset;
        }
        ArtifactKind::Model
    }

    /// Validate a user-supplied URL before any outbound request is made.
    pub fn validate_model_url(&self, s: &str) -> Result<Url, UrlError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(UrlError::Empty);
        }
        if trimmed.len() > MAX_URL_LEN {
            return Err(UrlError::TooLong { max: MAX_URL_LEN });
        }
        let url = Url::parse(trimmed).map_err(|e| UrlError::Malformed {
            message: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(UrlError::Scheme {
                scheme: url.scheme().to_string(),
            });
        }
        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_ascii_lowercase(),
            Some(Host::Ipv4(ip)) => {
                return Err(ip_error(IpAddr::V4(ip)));
            }
            Some(Host::Ipv6(ip)) => {
                return Err(ip_error(IpAddr::V6(ip)));
            }
            None => {
                return Err(UrlError::Malformed {
                    message: "missing host".into(),
                });
            }
        };
        if host == "localhost" || host.ends_with(".localhost") {
            return Err(UrlError::PrivateAddress { host });
        }
        let allowed = [
            self.hub_host.clone(),
            format!("www.{}", self.hub_host),
            CODE_HOST.to_string(),
            format!("www.{CODE_HOST}"),
        ];
        if !allowed.contains(&host) {
            return Err(UrlError::HostNotAllowed { host });
        }
        Ok(url)
    }
}

/// `owner/repo` for a GitHub URL.
pub fn github_owner_repo(s: &str) -> Option<(String, String)> {
    let url = parse_lenient(s)?;
    let host = url.host_str()?.to_ascii_lowercase();
    if host != CODE_HOST && host != format!("www.{CODE_HOST}") {
        return None;
    }
    let segments = path_segments(&url);
    match segments.as_slice() {
        [owner, repo, ..] => Some((
            owner.clone(),
            repo.trim_end_matches(".git").to_string(),
        )),
        _ => None,
    }
}

/// Last non-empty path segment, used as a default artifact name.
pub fn infer_name(s: &str) -> String {
    s.trim()
        .trim_end_matches('/')
        .rsplit('/')
        .find(|p| !p.is_empty())
        .unwrap_or("artifact")
        .to_string()
}

fn ip_error(ip: IpAddr) -> UrlError {
    // Literal IPs are never on the allow list; report private ones distinctly.
    let private = match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified() || (v6.segments()[0] & 0xfe00) == 0xfc00,
    };
    if private {
        UrlError::PrivateAddress {
            host: ip.to_string(),
        }
    } else {
        UrlError::HostNotAllowed {
            host: ip.to_string(),
        }
    }
}

fn parse_lenient(s: &str) -> Option<Url> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("://") {
        Url::parse(trimmed).ok()
    } else {
        Url::parse(&format!("https://{trimmed}")).ok()
    }
}

fn path_segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segs| {
            segs.filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
