//! # Modelgrade Metrics
//!
//! Built-in metric implementations for the modelgrade scorer. Each metric
//! reads hub metadata, source-host activity or an LLM rating and reports a
//! value in `[0, 1]` (or a per-device map) together with its latency.

pub mod bus_factor;
pub mod code_quality;
pub mod dataset_and_code;
pub mod dataset_quality;
pub mod license;
pub mod performance_claims;
pub mod ramp_up_time;
pub mod reproducibility;
pub mod reviewedness;
pub mod size_score;
pub mod source;
pub mod tree_score;

use modelgrade_core::clients::{GithubClient, HubClient, LlmClient};
use modelgrade_core::{Metric, MetricRegistry, ModelgradeConfig, UrlClassifier, UrlContextStore};
use std::sync::Arc;

/// Upstream clients and shared state handed to every built-in metric.
#[derive(Debug, Clone)]
pub struct MetricDeps {
    pub hub: HubClient,
    pub github: GithubClient,
    pub llm: LlmClient,
    pub context: Arc<UrlContextStore>,
    pub classifier: UrlClassifier,
}

impl MetricDeps {
    pub fn from_config(config: &ModelgradeConfig, context: Arc<UrlContextStore>) -> Self {
        Self {
            hub: HubClient::new(&config.hub),
            github: GithubClient::new(&config.github),
            llm: LlmClient::new(&config.llm),
            context,
            classifier: UrlClassifier::new(config.hub.host.clone()),
        }
    }

    /// Hub repository id for a model URL.
    pub fn repo_id(&self, model_url: &str) -> String {
        self.classifier.to_repo_id(model_url).repo_id
    }
}

/// Register all built-in metrics in their canonical output order.
pub fn register_builtin_metrics(registry: &MetricRegistry, deps: MetricDeps) {
    let metrics: Vec<Arc<dyn Metric>> = vec![
        Arc::new(ramp_up_time::RampUpTimeMetric::new(deps.clone())),
        Arc::new(bus_factor::BusFactorMetric::new(deps.clone())),
        Arc::new(license::LicenseMetric::new(deps.clone())),
        Arc::new(size_score::SizeScoreMetric::new(deps.clone())),
        Arc::new(dataset_and_code::DatasetAndCodeMetric::new(deps.clone())),
        Arc::new(dataset_quality::DatasetQualityMetric::new(deps.clone())),
        Arc::new(code_quality::CodeQualityMetric::new(deps.clone())),
        Arc::new(performance_claims::PerformanceClaimsMetric::new(deps.clone())),
        Arc::new(reproducibility::ReproducibilityMetric::new(deps.clone())),
        Arc::new(reviewedness::ReviewednessMetric::new(deps.clone())),
        Arc::new(tree_score::TreeScoreMetric::new(deps)),
    ];

    for metric in metrics {
        registry.register_metric(metric);
    }
    tracing::debug!(count = registry.len(), "Registered built-in metrics");
}
