//! Locating the source repository behind a model, and file-listing heuristics
//! shared by several metrics.

use crate::MetricDeps;
use modelgrade_core::clients::ModelInfo;
use modelgrade_core::url::github_owner_repo;
use regex::Regex;
use std::sync::LazyLock;

static GITHUB_LINK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"https?://github\.com/[A-Za-z0-9_.\-]+/[A-Za-z0-9_.\-]+").ok());

/// Card keys that may point at the source repository.
const CARD_REPO_KEYS: [&str; 5] = ["code_repository", "repository", "github", "repo", "source"];

/// Files that declare Python dependencies.
pub const DEPENDENCY_FILES: [&str; 5] = [
    "requirements.txt",
    "setup.py",
    "pyproject.toml",
    "environment.yml",
    "Pipfile",
];

/// First GitHub repository link in free text.
pub fn first_github_link(text: &str) -> Option<String> {
    let re = GITHUB_LINK.as_ref()?;
    let found = re.find(text)?.as_str();
    Some(found.trim_end_matches(['.', ')', '/']).to_string())
}

/// `owner/repo` of the code repository for a model.
///
/// Lookup order: the code URL recorded in the context store, source keys of
/// the card metadata, tags, then the first GitHub link in the README.
pub fn code_repo(
    deps: &MetricDeps,
    model_url: &str,
    info: Option<&ModelInfo>,
    readme: Option<&str>,
) -> Option<(String, String)> {
    if let Some(code_url) = deps.context.get_code_url(model_url)
        && let Some(found) = github_owner_repo(&code_url)
    {
        return Some(found);
    }

    if let Some(info) = info {
        let from_card = CARD_REPO_KEYS
            .iter()
            .filter_map(|key| info.card_str(key))
            .find_map(github_owner_repo);
        if from_card.is_some() {
            return from_card;
        }
        let from_tags = info
            .tags
            .iter()
            .filter(|t| t.contains("github.com"))
            .find_map(|t| github_owner_repo(t.trim_start_matches("code:")));
        if from_tags.is_some() {
            return from_tags;
        }
    }

    readme
        .and_then(first_github_link)
        .and_then(|link| github_owner_repo(&link))
}

pub fn is_python_file(path: &str) -> bool {
    path.ends_with(".py")
}

/// Share of `.py` files among all paths; `0.0` for an empty listing.
pub fn python_share<S: AsRef<str>>(paths: &[S]) -> f64 {
    if paths.is_empty() {
        return 0.0;
    }
    let py = paths.iter().filter(|p| is_python_file(p.as_ref())).count();
    py as f64 / paths.len() as f64
}

/// Whether any path's file name equals `name`.
pub fn has_file<S: AsRef<str>>(paths: &[S], name: &str) -> bool {
    paths
        .iter()
        .any(|p| p.as_ref().rsplit('/').next() == Some(name))
}
