//! Share of merged pull requests in the code repository that were reviewed.

use crate::{MetricDeps, source};
use async_trait::async_trait;
use futures::future::join_all;
use modelgrade_core::error::MetricError;
use modelgrade_core::types::NOT_APPLICABLE;
use modelgrade_core::{Metric, MetricResult, MetricValue, measure};
use tracing::{debug, warn};

pub const NAME: &str = "reviewedness";

/// Merged pull requests inspected for reviews.
pub const MAX_INSPECTED: usize = 50;

pub struct ReviewednessMetric {
    deps: MetricDeps,
}

impl ReviewednessMetric {
    pub fn new(deps: MetricDeps) -> Self {
        Self { deps }
    }

    async fn locate_repo(&self, model_url: &str) -> Option<(String, String)> {
        if let Some(found) = source::code_repo(&self.deps, model_url, None, None) {
            return Some(found);
        }
        let repo_id = self.deps.repo_id(model_url);
        let info = match self.deps.hub.model_info(&repo_id).await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(repo = %repo_id, error = %e, "Model metadata unavailable");
                None
            }
        };
        let readme = self.deps.hub.readme(&repo_id).await.ok().flatten();
        source::code_repo(&self.deps, model_url, info.as_ref(), readme.as_deref())
    }

    async fn evaluate(&self, model_url: &str) -> Result<MetricValue, MetricError> {
        let Some((owner, repo)) = self.locate_repo(model_url).await else {
            return Ok(MetricValue::Scalar(NOT_APPLICABLE));
        };
        let github = &self.deps.github;
        let merged: Vec<u64> = github
            .closed_pulls(&owner, &repo)
            .await?
            .into_iter()
            .filter(|pr| pr.merged_at.is_some())
            .map(|pr| pr.number)
            .take(MAX_INSPECTED)
            .collect();
        if merged.is_empty() {
            return Ok(MetricValue::Scalar(0.0));
        }

        let reviews = join_all(
            merged
                .iter()
                .map(|number| github.review_count(&owner, &repo, *number)),
        )
        .await;
        let reviewed = reviews
            .into_iter()
            .filter(|r| matches!(r, Ok(n) if *n > 0))
            .count();
        debug!(
            repo = %format!("{owner}/{repo}"),
            inspected = merged.len(),
            reviewed,
            "Counted reviewed pull requests"
        );
        Ok(MetricValue::Scalar(reviewed as f64 / merged.len() as f64))
    }
}

#[async_trait]
impl Metric for ReviewednessMetric {
    fn name(&self) -> &str {
        NAME
    }

    async fn compute(&self, model_url: &str) -> MetricResult {
        measure(NAME, MetricValue::Scalar(0.0), self.evaluate(model_url)).await
    }
}
