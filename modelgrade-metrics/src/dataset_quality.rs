//! Quality of the datasets a model declares.

use crate::MetricDeps;
use async_trait::async_trait;
use futures::future::join_all;
use modelgrade_core::clients::DatasetInfo;
use modelgrade_core::error::MetricError;
use modelgrade_core::{Metric, MetricResult, MetricValue, measure};
use tracing::warn;

pub const NAME: &str = "dataset_quality";

const POPULAR_DOWNLOADS: u64 = 1000;

/// Rubric for one dataset: card data, viewer, configs and popularity.
pub fn dataset_score(info: &DatasetInfo) -> f64 {
    let mut score = 0.0;
    if info.has_card() {
        score += 0.5;
    }
    if info.has_viewer() {
        score += 0.2;
    }
    if info.has_configs() {
        score += 0.1;
    }
    if info.downloads > POPULAR_DOWNLOADS {
        score += 0.2;
    }
    f64::min(score, 1.0)
}

pub struct DatasetQualityMetric {
    deps: MetricDeps,
}

impl DatasetQualityMetric {
    pub fn new(deps: MetricDeps) -> Self {
        Self { deps }
    }

    /// Card datasets plus the dataset recorded in the context store, deduplicated.
    fn dataset_ids(&self, model_url: &str, card: Vec<String>) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        let from_context = self
            .deps
            .context
            .get_dataset_url(model_url)
            .and_then(|u| self.deps.classifier.to_dataset_id(&u));
        for id in card.into_iter().chain(from_context) {
            let id = id.trim().to_string();
            if !id.is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    async fn evaluate(&self, model_url: &str) -> Result<MetricValue, MetricError> {
        let repo_id = self.deps.repo_id(model_url);
        let info = self.deps.hub.model_info(&repo_id).await?;
        let ids = self.dataset_ids(model_url, info.card_list("datasets"));
        if ids.is_empty() {
            return Ok(MetricValue::Scalar(0.0));
        }

        let lookups = ids.iter().map(|id| self.deps.hub.dataset_info(id));
        let total: f64 = join_all(lookups)
            .await
            .into_iter()
            .zip(&ids)
            .map(|(result, id)| match result {
                Ok(dataset) => dataset_score(&dataset),
                Err(e) => {
                    warn!(dataset = %id, error = %e, "Dataset lookup failed");
                    0.0
                }
            })
            .sum();
        Ok(MetricValue::Scalar(total / ids.len() as f64))
    }
}

#[async_trait]
impl Metric for DatasetQualityMetric {
    fn name(&self) -> &str {
        NAME
    }

    async fn compute(&self, model_url: &str) -> MetricResult {
        measure(NAME, MetricValue::Scalar(0.0), self.evaluate(model_url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MODEL_URL, deps_for};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_dataset_score_rubric() {
        let full: DatasetInfo = serde_json::from_value(json!({
            "id": "squad",
            "cardData": {"configs": [{"config_name": "default"}]},
            "viewer": true,
            "downloads": 50_000
        }))
        .unwrap();
        assert!((dataset_score(&full) - 1.0).abs() < 1e-9);

        let bare: DatasetInfo = serde_json::from_value(json!({"id": "x", "downloads": 10})).unwrap();
        assert_eq!(dataset_score(&bare), 0.0);
    }

    #[tokio::test]
    async fn test_averages_over_datasets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/models/org/m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "org/m",
                "cardData": {"datasets": ["good/set", "missing/set"]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/datasets/good/set"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "good/set",
                "cardData": {"license": "mit"},
                "viewer": true
            })))
            .mount(&server)
            .await;

        let metric = DatasetQualityMetric::new(deps_for(&server.uri()));
        let value = metric.compute(MODEL_URL).await.value.as_scalar();
        assert!((value - 0.35).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_no_datasets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/models/org/m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "org/m"})))
            .mount(&server)
            .await;

        let metric = DatasetQualityMetric::new(deps_for(&server.uri()));
        assert_eq!(metric.compute(MODEL_URL).await.value, MetricValue::Scalar(0.0));
    }

    #[tokio::test]
    async fn test_context_dataset_counts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/models/org/m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "org/m"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/datasets/org/data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "org/data",
                "downloads": 5000
            })))
            .mount(&server)
            .await;

        let deps = deps_for(&server.uri());
        deps.context
            .set_context(MODEL_URL, None, Some("https://hub.example/datasets/org/data"));
        let metric = DatasetQualityMetric::new(deps);
        let value = metric.compute(MODEL_URL).await.value.as_scalar();
        assert!((value - 0.2).abs() < 1e-9);
    }
}
