//! Bus factor: how well knowledge of the model's code is spread across people.
//!
//! Active repositories are judged on the last year of commits: author
//! diversity (`1 - HHI`), how many authors cover 80% of commits, the number of
//! distinct humans, freshness and the fork network. Archived or inactive
//! repositories fall back to lifetime contributor counts.

use crate::{MetricDeps, source};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use modelgrade_core::clients::Commit;
use modelgrade_core::error::MetricError;
use modelgrade_core::{Metric, MetricResult, MetricValue, measure};
use std::collections::HashMap;
use tracing::{debug, warn};

pub const NAME: &str = "bus_factor";

/// Value reported when the repository cannot be found or read.
pub const NEUTRAL: f64 = 0.3;

pub const LOOKBACK_DAYS: i64 = 365;

/// HHI is only trusted on at least this many human commits.
const MIN_COMMITS_FOR_DIVERSITY: u64 = 10;
const FRESHNESS_TAU_DAYS: f64 = 180.0;

const W_DIVERSITY: f64 = 0.40;
const W_COVERAGE: f64 = 0.25;
const W_CONTRIBUTORS: f64 = 0.20;
const W_FRESHNESS: f64 = 0.10;
const W_NETWORK: f64 = 0.05;

/// Human commit activity in the lookback window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitStats {
    /// Commits per distinct human author.
    pub counts: Vec<u64>,
    pub total: u64,
    pub latest: Option<DateTime<Utc>>,
}

impl CommitStats {
    pub fn humans(&self) -> usize {
        self.counts.len()
    }
}

/// Aggregate commits by author, skipping bots.
pub fn commit_stats(commits: &[Commit]) -> CommitStats {
    let mut per_author: HashMap<String, u64> = HashMap::new();
    let mut latest: Option<DateTime<Utc>> = None;
    for commit in commits.iter().filter(|c| !c.is_bot()) {
        let key = commit.author_key().unwrap_or_else(|| "unknown".to_string());
        *per_author.entry(key).or_default() += 1;
        if let Some(at) = commit.authored_at() {
            latest = Some(latest.map_or(at, |l| l.max(at)));
        }
    }
    let counts: Vec<u64> = per_author.into_values().collect();
    CommitStats {
        total: counts.iter().sum(),
        counts,
        latest,
    }
}

/// `ln(1 + n) / ln(base)`, capped at 1.
pub fn log_norm(n: u64, base: f64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    ((n as f64).ln_1p() / base.ln()).min(1.0)
}

/// Smallest number of authors whose commits reach `coverage` of the total.
pub fn authors_for_coverage(counts: &[u64], coverage: f64) -> usize {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return 0;
    }
    let mut sorted = counts.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let need = coverage * total as f64;
    let mut acc = 0u64;
    for (i, c) in sorted.iter().enumerate() {
        acc += c;
        if acc as f64 >= need {
            return i + 1;
        }
    }
    sorted.len()
}

/// Score for a repository with recent human commits.
pub fn active_score(stats: &CommitStats, days_since_latest: i64, archived: bool, network: u64) -> f64 {
    let (diversity, coverage) = if stats.total >= MIN_COMMITS_FOR_DIVERSITY {
        let hhi: f64 = stats
            .counts
            .iter()
            .map(|c| {
                let share = *c as f64 / stats.total as f64;
                share * share
            })
            .sum();
        let k = authors_for_coverage(&stats.counts, 0.80).max(1);
        ((1.0 - hhi).clamp(0.0, 1.0), (5.0 / k as f64).min(1.0))
    } else {
        (0.0, 0.0)
    };
    let contributors = log_norm(stats.humans() as u64, 10.0);
    let freshness = if archived {
        0.0
    } else {
        (-(days_since_latest.max(0) as f64) / FRESHNESS_TAU_DAYS).exp()
    };
    let network = log_norm(network, 50.0);

    let score = W_DIVERSITY * diversity
        + W_COVERAGE * coverage
        + W_CONTRIBUTORS * contributors
        + W_FRESHNESS * freshness
        + W_NETWORK * network;
    score.clamp(0.0, 1.0)
}

/// Score for an archived or inactive repository from its lifetime contributor
/// count. Freshness is dropped and the remaining weights renormalized.
pub fn lifetime_score(contributors: u64, network: u64) -> f64 {
    let n = contributors as f64;
    let diversity = if contributors <= 1 { 0.0 } else { 1.0 - 1.0 / n };
    let coverage = (n / 5.0).min(1.0);
    let breadth = log_norm(contributors, 6.0);
    let network = log_norm(network, 50.0);

    let total = W_DIVERSITY + W_COVERAGE + W_CONTRIBUTORS + W_NETWORK;
    let score = (W_DIVERSITY * diversity
        + W_COVERAGE * coverage
        + W_CONTRIBUTORS * breadth
        + W_NETWORK * network)
        / total;
    score.clamp(0.0, 1.0)
}

pub struct BusFactorMetric {
    deps: MetricDeps,
}

impl BusFactorMetric {
    pub fn new(deps: MetricDeps) -> Self {
        Self { deps }
    }

    async fn locate_repo(&self, model_url: &str) -> Result<Option<(String, String)>, MetricError> {
        if let Some(found) = source::code_repo(&self.deps, model_url, None, None) {
            return Ok(Some(found));
        }
        let repo_id = self.deps.repo_id(model_url);
        let info = self.deps.hub.model_info(&repo_id).await?;
        if let Some(found) = source::code_repo(&self.deps, model_url, Some(&info), None) {
            return Ok(Some(found));
        }
        let readme = self.deps.hub.readme(&repo_id).await?;
        Ok(source::code_repo(&self.deps, model_url, None, readme.as_deref()))
    }

    async fn evaluate(&self, model_url: &str) -> Result<MetricValue, MetricError> {
        let Some((owner, repo)) = self.locate_repo(model_url).await? else {
            debug!(model = %model_url, "No code repository found");
            return Ok(MetricValue::Scalar(NEUTRAL));
        };
        let github = &self.deps.github;
        let info = github.repo(&owner, &repo).await?;
        let now = Utc::now();
        let since = now - Duration::days(LOOKBACK_DAYS);
        let commits = github.commits_since(&owner, &repo, since).await?;
        let stats = commit_stats(&commits);
        let network = info.network_size();

        let score = if info.archived || stats.humans() == 0 {
            let lifetime = match github.contributors(&owner, &repo).await {
                Ok(list) => list.iter().filter(|c| !c.is_bot()).count() as u64,
                Err(e) => {
                    warn!(repo = %info.full_name, error = %e, "Could not list contributors");
                    0
                }
            };
            lifetime_score(lifetime, network)
        } else {
            let days = stats
                .latest
                .or(info.pushed_at)
                .map(|at| (now - at).num_days())
                .unwrap_or(LOOKBACK_DAYS);
            active_score(&stats, days, info.archived, network)
        };
        debug!(
            repo = %format!("{owner}/{repo}"),
            humans = stats.humans(),
            commits = stats.total,
            score,
            "Computed bus factor"
        );
        Ok(MetricValue::Scalar(score))
    }
}

#[async_trait]
impl Metric for BusFactorMetric {
    fn name(&self) -> &str {
        NAME
    }

    async fn compute(&self, model_url: &str) -> MetricResult {
        measure(NAME, MetricValue::Scalar(NEUTRAL), self.evaluate(model_url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MODEL_URL, deps_for};
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn commit(login: &str, date: DateTime<Utc>) -> Value {
        json!({
            "author": {"login": login, "type": "User"},
            "commit": {"author": {"name": login, "email": format!("{login}@x.org"), "date": date.to_rfc3339()}}
        })
    }

    fn parse_commits(values: Vec<Value>) -> Vec<Commit> {
        serde_json::from_value(Value::Array(values)).unwrap()
    }

    #[test]
    fn test_commit_stats_skips_bots() {
        let now = Utc::now();
        let commits = parse_commits(vec![
            commit("alice", now - Duration::days(3)),
            commit("alice", now - Duration::days(1)),
            commit("bob", now - Duration::days(10)),
            commit("dependabot[bot]", now),
        ]);
        let stats = commit_stats(&commits);
        assert_eq!(stats.humans(), 2);
        assert_eq!(stats.total, 3);
        let latest = stats.latest.unwrap();
        assert_eq!((now - latest).num_days(), 1);
    }

    #[test]
    fn test_authors_for_coverage() {
        assert_eq!(authors_for_coverage(&[], 0.8), 0);
        assert_eq!(authors_for_coverage(&[10], 0.8), 1);
        assert_eq!(authors_for_coverage(&[1, 1, 1, 1, 1], 0.8), 4);
        assert_eq!(authors_for_coverage(&[2, 90, 8], 0.8), 1);
    }

    #[test]
    fn test_single_author_repo_scores_low() {
        let solo = CommitStats {
            counts: vec![40],
            total: 40,
            latest: None,
        };
        let spread = CommitStats {
            counts: vec![8, 8, 8, 8, 8],
            total: 40,
            latest: None,
        };
        let solo_score = active_score(&solo, 0, false, 0);
        let spread_score = active_score(&spread, 0, false, 0);
        assert!(solo_score < spread_score);
        assert!((0.0..=1.0).contains(&spread_score));
        // D = 0, K = 1 (5/1 capped), C = ln2/ln10, F = 1
        let expected = 0.25 + 0.20 * 2f64.ln() / 10f64.ln() + 0.10;
        assert!((solo_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_small_samples_skip_diversity() {
        let few = CommitStats {
            counts: vec![3, 3],
            total: 6,
            latest: None,
        };
        let score = active_score(&few, 0, true, 0);
        let expected = 0.20 * 3f64.ln() / 10f64.ln();
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_lifetime_score() {
        assert_eq!(lifetime_score(0, 0), 0.0);
        let five = lifetime_score(5, 0);
        let expected = (0.40 * 0.8 + 0.25 * 1.0 + 0.20 * 1.0) / 0.90;
        assert!((five - expected).abs() < 1e-9);
        assert!(lifetime_score(20, 100) <= 1.0);
    }

    #[tokio::test]
    async fn test_no_repository_is_neutral() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/models/org/m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "org/m"})))
            .mount(&server)
            .await;

        let metric = BusFactorMetric::new(deps_for(&server.uri()));
        assert_eq!(metric.compute(MODEL_URL).await.value, MetricValue::Scalar(NEUTRAL));
    }

    #[tokio::test]
    async fn test_active_repository_from_context() {
        let server = MockServer::start().await;
        let now = Utc::now();
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "full_name": "acme/widget",
                "default_branch": "main",
                "archived": false,
                "forks_count": 3
            })))
            .mount(&server)
            .await;
        let commits: Vec<Value> = (0..12)
            .map(|i| commit(["ann", "ben", "cat"][i % 3], now - Duration::days(i as i64)))
            .collect();
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget/commits"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(commits)))
            .mount(&server)
            .await;

        let deps = deps_for(&server.uri());
        deps.context
            .set_context(MODEL_URL, Some("https://github.com/acme/widget"), None);
        let metric = BusFactorMetric::new(deps);
        let value = metric.compute(MODEL_URL).await.value.as_scalar();

        let stats = CommitStats {
            counts: vec![4, 4, 4],
            total: 12,
            latest: Some(now),
        };
        let expected = active_score(&stats, 0, false, 3);
        assert!((value - expected).abs() < 1e-6, "{value} vs {expected}");
    }

    #[tokio::test]
    async fn test_archived_repository_uses_lifetime_contributors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "full_name": "acme/old",
                "archived": true,
                "forks_count": 0
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/old/commits"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/old/contributors"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"login": "a", "contributions": 10, "type": "User"},
                {"login": "b", "contributions": 5, "type": "User"},
                {"login": "renovate[bot]", "contributions": 50, "type": "Bot"}
            ])))
            .mount(&server)
            .await;

        let deps = deps_for(&server.uri());
        deps.context
            .set_context(MODEL_URL, Some("https://github.com/acme/old"), None);
        let metric = BusFactorMetric::new(deps);
        let value = metric.compute(MODEL_URL).await.value.as_scalar();
        assert!((value - lifetime_score(2, 0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unreadable_repository_is_neutral() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let deps = deps_for(&server.uri());
        deps.context
            .set_context(MODEL_URL, Some("https://github.com/acme/gone"), None);
        let metric = BusFactorMetric::new(deps);
        assert_eq!(metric.compute(MODEL_URL).await.value, MetricValue::Scalar(NEUTRAL));
    }
}
