//! Lineage quality: mean score of the parent models named in `config.json`.

use crate::MetricDeps;
use async_trait::async_trait;
use modelgrade_core::error::MetricError;
use modelgrade_core::store::parent_models;
use modelgrade_core::{Metric, MetricResult, MetricValue, measure};

pub const NAME: &str = "tree_score";

/// Score assumed for a parent that is not a well-known base model.
pub const DEFAULT_PARENT_SCORE: f64 = 0.7;

const KNOWN_BASES: [(&str, f64); 9] = [
    ("bert-base-uncased", 0.85),
    ("bert-base-cased", 0.85),
    ("bert-large-uncased", 0.88),
    ("gpt2", 0.90),
    ("gpt2-medium", 0.88),
    ("gpt2-large", 0.87),
    ("roberta-base", 0.86),
    ("t5-base", 0.84),
    ("distilbert-base-uncased", 0.82),
];

/// Score for one parent id. The model name (last path segment) is matched
/// exactly first; otherwise the longest known base contained in the id wins.
pub fn parent_score(parent_id: &str) -> f64 {
    let lower = parent_id.to_ascii_lowercase();
    let name = lower.rsplit('/').next().unwrap_or(&lower);
    if let Some((_, score)) = KNOWN_BASES.iter().find(|(base, _)| *base == name) {
        return *score;
    }
    KNOWN_BASES
        .iter()
        .filter(|(base, _)| lower.contains(base))
        .max_by_key(|(base, _)| base.len())
        .map_or(DEFAULT_PARENT_SCORE, |(_, score)| *score)
}

/// Mean parent score; `0.0` without parents.
pub fn lineage_score(parents: &[String]) -> f64 {
    if parents.is_empty() {
        return 0.0;
    }
    parents.iter().map(|p| parent_score(p)).sum::<f64>() / parents.len() as f64
}

pub struct TreeScoreMetric {
    deps: MetricDeps,
}

impl TreeScoreMetric {
    pub fn new(deps: MetricDeps) -> Self {
        Self { deps }
    }

    async fn evaluate(&self, model_url: &str) -> Result<MetricValue, MetricError> {
        let repo_id = self.deps.repo_id(model_url);
        let Some(config) = self.deps.hub.config_json(&repo_id).await? else {
            return Ok(MetricValue::Scalar(0.0));
        };
        let parents = parent_models(&config, &repo_id);
        tracing::debug!(repo = %repo_id, parents = ?parents, "Resolved parent models");
        Ok(MetricValue::Scalar(lineage_score(&parents)))
    }
}

#[async_trait]
impl Metric for TreeScoreMetric {
    fn name(&self) -> &str {
        NAME
    }

    async fn compute(&self, model_url: &str) -> MetricResult {
        measure(NAME, MetricValue::Scalar(0.0), self.evaluate(model_url)).await
    }
}
