//! Availability of training data, example code and demos alongside the model.

use crate::{MetricDeps, source};
use async_trait::async_trait;
use modelgrade_core::error::MetricError;
use modelgrade_core::url::github_owner_repo;
use modelgrade_core::{Metric, MetricResult, MetricValue, measure};
use tracing::warn;

pub const NAME: &str = "dataset_and_code";
pub const OUTPUT_FIELD: &str = "dataset_and_code_score";

const DATASET_POINTS: f64 = 0.5;
const CODE_POINTS: f64 = 0.3;
const DEMO_POINTS: f64 = 0.2;

pub struct DatasetAndCodeMetric {
    deps: MetricDeps,
}

impl DatasetAndCodeMetric {
    pub fn new(deps: MetricDeps) -> Self {
        Self { deps }
    }

    async fn evaluate(&self, model_url: &str) -> Result<MetricValue, MetricError> {
        let repo_id = self.deps.repo_id(model_url);
        let info = self.deps.hub.model_info(&repo_id).await?;
        let mut score = 0.0;

        let linked_dataset = self.deps.context.get_dataset_url(model_url).is_some();
        if linked_dataset || !info.card_list("datasets").is_empty() {
            score += DATASET_POINTS;
        }

        let code_repo = self
            .deps
            .context
            .get_code_url(model_url)
            .and_then(|u| github_owner_repo(&u));
        let has_python = match code_repo {
            Some((owner, repo)) => match self.deps.github.tree_files(&owner, &repo).await {
                Ok(files) => files.iter().any(|f| source::is_python_file(f)),
                Err(e) => {
                    warn!(repo = %format!("{owner}/{repo}"), error = %e, "Could not list code files");
                    false
                }
            },
            None => info.file_names().any(source::is_python_file),
        };
        if has_python {
            score += CODE_POINTS;
        }

        if !info.spaces.is_empty() {
            score += DEMO_POINTS;
        }
        Ok(MetricValue::Scalar(score))
    }
}

#[async_trait]
impl Metric for DatasetAndCodeMetric {
    fn name(&self) -> &str {
        NAME
    }

    fn output_field(&self) -> &str {
        OUTPUT_FIELD
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

    async fn serve_model(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/models/org/m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn scalar(result: MetricResult) -> f64 {
        result.value.as_scalar()
    }

    #[tokio::test]
    async fn test_all_signals_present() {
        let server = MockServer::start().await;
        serve_model(
            &server,
            json!({
                "id": "org/m",
                "cardData": {"datasets": ["squad"]},
                "siblings": [{"rfilename": "modeling.py"}],
                "spaces": ["org/demo"]
            }),
        )
        .await;

        let metric = DatasetAndCodeMetric::new(deps_for(&server.uri()));
        assert!((scalar(metric.compute(MODEL_URL).await) - 1.0).abs() < 1e-9);
        assert_eq!(metric.output_field(), "dataset_and_code_score");
    }

    #[tokio::test]
    async fn test_context_dataset_and_github_code() {
        let server = MockServer::start().await;
        serve_model(&server, json!({"id": "org/m"})).await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/train"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"default_branch": "dev"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/train/git/trees/dev"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tree": [{"path": "train.py", "type": "blob"}, {"path": "src", "type": "tree"}]
            })))
            .mount(&server)
            .await;

        let deps = deps_for(&server.uri());
        deps.context.set_context(
            MODEL_URL,
            Some("https://github.com/acme/train"),
            Some("https://hub.example/datasets/org/data"),
        );
        let metric = DatasetAndCodeMetric::new(deps);
        assert!((scalar(metric.compute(MODEL_URL).await) - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_nothing_linked() {
        let server = MockServer::start().await;
        serve_model(&server, json!({"id": "org/m", "siblings": [{"rfilename": "model.bin"}]})).await;

        let metric = DatasetAndCodeMetric::new(deps_for(&server.uri()));
        assert_eq!(scalar(metric.compute(MODEL_URL).await), 0.0);
    }
}
