//! Evidence behind the model's performance claims.

use crate::MetricDeps;
use async_trait::async_trait;
use modelgrade_core::clients::ModelInfo;
use modelgrade_core::error::MetricError;
use modelgrade_core::{Metric, MetricResult, MetricValue, measure};
use serde_json::Value;

pub const NAME: &str = "performance_claims";

const INDEX_POINTS: f64 = 0.5;
const RESULT_POINTS: f64 = 0.1;
const DATASET_POINTS: f64 = 0.05;
const EVIDENCE_CAP: f64 = 0.9;
const POPULARITY_POINTS: f64 = 0.05;
const POPULAR_LIKES: u64 = 50;
const POPULAR_DOWNLOADS: u64 = 10_000;

fn non_empty(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}

/// Points from the structured `model-index` results.
pub fn evidence_score(model_index: Option<&Value>) -> f64 {
    let Some(entries) = model_index.filter(|v| non_empty(Some(*v))) else {
        return 0.0;
    };
    let mut score = INDEX_POINTS;
    let results = entries
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.get("results")?.as_array())
        .flatten();
    for result in results {
        if non_empty(result.get("task")) && non_empty(result.get("metrics")) {
            score += RESULT_POINTS;
            if non_empty(result.get("dataset")) {
                score += DATASET_POINTS;
            }
        }
    }
    score.min(EVIDENCE_CAP)
}

pub fn claims_score(info: &ModelInfo) -> f64 {
    let mut score = evidence_score(info.model_index());
    if info.likes >= POPULAR_LIKES {
        score += POPULARITY_POINTS;
    }
    if info.downloads >= POPULAR_DOWNLOADS {
        score += POPULARITY_POINTS;
    }
    score.clamp(0.0, 1.0)
}

pub struct PerformanceClaimsMetric {
    deps: MetricDeps,
}

impl PerformanceClaimsMetric {
    pub fn new(deps: MetricDeps) -> Self {
        Self { deps }
    }

    async fn evaluate(&self, model_url: &str) -> Result<MetricValue, MetricError> {
        let repo_id = self.deps.repo_id(model_url);
        let info = self.deps.hub.model_info(&repo_id).await?;
        Ok(MetricValue::Scalar(claims_score(&info)))
    }
}

#[async_trait]
impl Metric for PerformanceClaimsMetric {
    fn name(&self) -> &str {
        NAME
    }

    async fn compute(&self, model_url: &str) -> MetricResult {
        measure(NAME, MetricValue::Scalar(0.0), self.evaluate(model_url)).await
    }
}
