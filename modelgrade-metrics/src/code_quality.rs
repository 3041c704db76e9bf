//! Code quality from repository layout: dependency manifests and Python share.

use crate::{MetricDeps, source};
use async_trait::async_trait;
use modelgrade_core::error::MetricError;
use modelgrade_core::{Metric, MetricResult, MetricValue, measure};

pub const NAME: &str = "code_quality";

/// Manifests that count for a hub repository without separate code.
const HUB_DEPENDENCY_FILES: [&str; 3] = ["requirements.txt", "pyproject.toml", "config.json"];

/// Rubric for a source repository listing.
pub fn score_code_repo<S: AsRef<str>>(files: &[S]) -> f64 {
    if files.is_empty() {
        return 0.0;
    }
    let mut score = 0.0;
    if source::has_file(files, "requirements.txt") {
        score += 0.5;
    }
    score += 0.5 * source::python_share(files);
    score.clamp(0.0, 1.0)
}

/// Rubric for the model repository's own files.
pub fn score_model_files<S: AsRef<str>>(files: &[S]) -> f64 {
    let has_deps = HUB_DEPENDENCY_FILES
        .iter()
        .any(|name| source::has_file(files, name));
    let share = source::python_share(files);
    let score = match (share > 0.0, has_deps) {
        (true, true) => 0.3 + 0.7 * share,
        (true, false) => 0.7 * share,
        (false, true) => 0.3,
        (false, false) => 0.0,
    };
    score.clamp(0.0, 1.0)
}

pub struct CodeQualityMetric {
    deps: MetricDeps,
}

impl CodeQualityMetric {
    pub fn new(deps: MetricDeps) -> Self {
        Self { deps }
    }

    async fn evaluate(&self, model_url: &str) -> Result<MetricValue, MetricError> {
        if let Some((owner, repo)) = source::code_repo(&self.deps, model_url, None, None) {
            let files = self.deps.github.tree_files(&owner, &repo).await?;
            return Ok(MetricValue::Scalar(score_code_repo(&files)));
        }
        let repo_id = self.deps.repo_id(model_url);
        let info = self.deps.hub.model_info(&repo_id).await?;
        let files: Vec<&str> = info.file_names().collect();
        Ok(MetricValue::Scalar(score_model_files(&files)))
    }
}

#[async_trait]
impl Metric for CodeQualityMetric {
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
    fn test_score_code_repo() {
        let files = ["requirements.txt", "train.py", "eval.py", "README.md"];
        assert!((score_code_repo(&files) - 0.75).abs() < 1e-9);
        assert_eq!(score_code_repo::<&str>(&[]), 0.0);
        assert_eq!(score_code_repo(&["README.md"]), 0.0);
    }

    #[test]
    fn test_score_model_files() {
        assert_eq!(score_model_files(&["config.json", "model.safetensors"]), 0.3);
        let with_code = ["config.json", "modeling.py", "model.bin", "README.md"];
        assert!((score_model_files(&with_code) - (0.3 + 0.7 * 0.25)).abs() < 1e-9);
        assert!((score_model_files(&["handler.py", "x.bin"]) - 0.35).abs() < 1e-9);
        assert_eq!(score_model_files(&["model.bin"]), 0.0);
    }

    #[tokio::test]
    async fn test_uses_code_repository_when_linked() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"default_branch": "main"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/code/git/trees/main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tree": [
                    {"path": "requirements.txt", "type": "blob"},
                    {"path": "pkg/model.py", "type": "blob"}
                ]
            })))
            .mount(&server)
            .await;

        let deps = deps_for(&server.uri());
        deps.context
            .set_context(MODEL_URL, Some("https://github.com/acme/code"), None);
        let metric = CodeQualityMetric::new(deps);
        let value = metric.compute(MODEL_URL).await.value.as_scalar();
        assert!((value - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_falls_back_to_model_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/models/org/m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "org/m",
                "siblings": [{"rfilename": "config.json"}, {"rfilename": "model.safetensors"}]
            })))
            .mount(&server)
            .await;

        let metric = CodeQualityMetric::new(deps_for(&server.uri()));
        assert_eq!(metric.compute(MODEL_URL).await.value, MetricValue::Scalar(0.3));
    }
}
