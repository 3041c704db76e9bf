//! Scores a mocked hub model through the orchestrator with every built-in metric.

use modelgrade_core::clients::{GithubClient, HubClient, LlmClient};
use modelgrade_core::{
    Combiner, MetricRegistry, MetricValue, Orchestrator, UrlClassifier, UrlContextStore,
};
use modelgrade_metrics::{MetricDeps, register_builtin_metrics};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_URL: &str = "https://hub.example/acme/tiny-bert";

async fn mock_hub(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/models/acme/tiny-bert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "acme/tiny-bert",
            "cardData": {"license": "mit", "datasets": ["acme/corpus"]},
            "siblings": [
                {"rfilename": "model.safetensors", "size": 100_000_000u64},
                {"rfilename": "config.json", "size": 600},
                {"rfilename": "requirements.txt", "size": 40}
            ],
            "likes": 75,
            "downloads": 500
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/datasets/acme/corpus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "acme/corpus",
            "cardData": {"license": "cc-by-4.0"},
            "downloads": 2_000
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/acme/tiny-bert/resolve/main/README.md"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "# tiny-bert\n```python\nfrom transformers import AutoModel\n\
             model = AutoModel.from_pretrained(\"acme/tiny-bert\")\n```\n",
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/acme/tiny-bert/resolve/main/config.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_name_or_path": "bert-base-uncased"
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "0.9"}}]
        })))
        .mount(server)
        .await;
}

fn orchestrator_for(base: &str) -> Orchestrator {
    let context = Arc::new(UrlContextStore::new());
    let classifier = UrlClassifier::new("hub.example");
    let deps = MetricDeps {
        hub: HubClient::with_base_url(base, 5),
        github: GithubClient::with_api_url(base, None, 5),
        llm: LlmClient::with_endpoint(base, "test-model", Some("k".into()), 5),
        context: context.clone(),
        classifier: classifier.clone(),
    };
    let registry = Arc::new(MetricRegistry::new());
    register_builtin_metrics(&registry, deps);
    Orchestrator::new(registry, context, classifier, Combiner::default())
}

#[tokio::test]
async fn test_full_record_shape_and_values() {
    let server = MockServer::start().await;
    mock_hub(&server).await;

    let orch = orchestrator_for(&server.uri());
    let record = orch.score(MODEL_URL, None, None).await.unwrap();

    assert_eq!(record.name, "acme/tiny-bert");
    assert_eq!(record.fields.len(), 11);
    assert_eq!(record.field("license").unwrap().value, MetricValue::Scalar(1.0));
    assert_eq!(record.field("ramp_up_time").unwrap().value, MetricValue::Scalar(0.9));
    assert_eq!(record.field("bus_factor").unwrap().value, MetricValue::Scalar(0.3));
    assert_eq!(record.field("reviewedness").unwrap().value, MetricValue::Scalar(-1.0));
    assert_eq!(record.field("tree_score").unwrap().value, MetricValue::Scalar(0.85));
    assert_eq!(record.field("reproducibility").unwrap().value, MetricValue::Scalar(1.0));
    assert_eq!(record.field("code_quality").unwrap().value, MetricValue::Scalar(0.3));
    assert_eq!(
        record.field("dataset_and_code_score").unwrap().value,
        MetricValue::Scalar(0.5)
    );

    let json = record.to_json();
    let size = json["size_score"].as_object().unwrap();
    assert_eq!(size["raspberry_pi"], 0.8);
    assert_eq!(size["aws_server"], 0.99);
    assert!((0.0..=1.0).contains(&record.net_score));
    assert!(json["net_score"].as_f64().unwrap() > 0.5);
}

#[tokio::test]
async fn test_unreachable_upstream_keeps_every_field() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let orch = orchestrator_for(&server.uri());
    let record = orch.score(MODEL_URL, None, None).await.unwrap();

    assert_eq!(record.fields.len(), 11);
    assert_eq!(record.field("bus_factor").unwrap().value, MetricValue::Scalar(0.3));
    assert_eq!(record.field("license").unwrap().value, MetricValue::Scalar(0.0));
    assert!((0.0..=1.0).contains(&record.net_score));
}

#[tokio::test]
async fn test_non_model_url_is_skipped() {
    let server = MockServer::start().await;
    let orch = orchestrator_for(&server.uri());
    assert!(
        orch.score("https://hub.example/datasets/acme/corpus", None, None)
            .await
            .is_none()
    );
}
