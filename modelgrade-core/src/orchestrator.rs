//! Orchestrator: the top-level "score one model URL" operation.

use crate::combiner::Combiner;
use crate::config::ModelgradeConfig;
use crate::context::UrlContextStore;
use crate::evaluator::{MetricTask, run_parallel};
use crate::registry::{MetricRegistry, elapsed_ms};
use crate::types::{Device, DeviceMap, FieldScore, MetricResult, MetricValue, ScoreRecord};
use crate::url::UrlClassifier;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Output field that always carries a full device map.
pub const SIZE_FIELD: &str = "size_score";

/// Scores model URLs against every registered metric.
pub struct Orchestrator {
    registry: Arc<MetricRegistry>,
    context: Arc<UrlContextStore>,
    classifier: UrlClassifier,
    combiner: Combiner,
    timeout: Duration,
    max_workers: usize,
    url_locks: Mutex<HashMap<String, Weak<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("metrics", &self.registry.len())
            .field("hub_host", &self.classifier.hub_host())
            .field("timeout", &self.timeout)
            .field("max_workers", &self.max_workers)
            .finish()
    }
}

impl Orchestrator {
    pub fn new(
        registry: Arc<MetricRegistry>,
        context: Arc<UrlContextStore>,
        classifier: UrlClassifier,
        combiner: Combiner,
    ) -> Self {
        Self {
            registry,
            context,
            classifier,
            combiner,
            timeout: Duration::from_secs(60),
            max_workers: crate::evaluator::DEFAULT_MAX_WORKERS,
            url_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Build from configuration: hub host, weights, timeout and width.
    pub fn from_config(
        registry: Arc<MetricRegistry>,
        context: Arc<UrlContextStore>,
        config: &ModelgradeConfig,
    ) -> Self {
        Self::new(
            registry,
            context,
            UrlClassifier::new(config.hub.host.clone()),
            Combiner::new(config.scoring.weights.clone()),
        )
        .with_timeout(Duration::from_secs(config.scoring.timeout_secs))
        .with_max_workers(config.scoring.max_workers)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    pub fn context(&self) -> &Arc<UrlContextStore> {
        &self.context
    }

    pub fn classifier(&self) -> &UrlClassifier {
        &self.classifier
    }

    pub fn combiner(&self) -> &Combiner {
        &self.combiner
    }

    /// Score one model. Returns `None` for URLs that are not model URLs.
    pub async fn score(
        &self,
        model_url: &str,
        code_url: Option<&str>,
        dataset_url: Option<&str>,
    ) -> Option<ScoreRecord> {
        let model_url = model_url.trim();
        if !self.classifier.is_model_url(model_url) {
            debug!(url = %model_url, "Skipping non-model URL");
            return None;
        }

        // Same-URL invocations share one context entry, so they run one at a time.
        let lock = self.url_lock(model_url);
        let _guard = lock.lock().await;

        self.context.set_context(model_url, code_url, dataset_url);

        let descriptors = self.registry.registered();
        let start = Instant::now();
        let tasks: Vec<MetricTask> = descriptors
            .iter()
            .map(|d| {
                let metric = d.compute.clone();
                let url = model_url.to_string();
                let fut = async move { metric.compute(&url).await }.boxed();
                (d.output_field.clone(), fut)
            })
            .collect();

        let results = run_parallel(tasks, self.timeout, self.max_workers).await;

        let mut fields: Vec<FieldScore> = Vec::new();
        let mut scalars: HashMap<String, f64> = HashMap::new();
        for descriptor in &descriptors {
            let field = descriptor.output_field.as_str();
            if fields.iter().any(|f| f.field == field) {
                continue;
            }
            let result = results
                .get(field)
                .cloned()
                .unwrap_or_else(MetricResult::neutral);
            let value = normalize_value(field, result.value);
            scalars.insert(field.to_string(), value.as_scalar());
            fields.push(FieldScore {
                field: field.to_string(),
                value,
                latency_ms: result.latency_ms,
            });
        }

        let net_score = self.combiner.combine(&scalars);
        let record = ScoreRecord {
            name: self.classifier.to_repo_id(model_url).repo_id,
            category: ScoreRecord::CATEGORY_MODEL.to_string(),
            net_score,
            net_score_latency: elapsed_ms(start),
            fields,
        };
        info!(
            model = %record.name,
            net_score = record.net_score,
            latency_ms = record.net_score_latency,
            "Scored model"
        );
        Some(record)
    }

    fn url_lock(&self, model_url: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.url_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, weak| weak.strong_count() > 0);
        if let Some(existing) = locks.get(model_url).and_then(Weak::upgrade) {
            return existing;
        }
        let lock = Arc::new(tokio::sync::Mutex::new(()));
        locks.insert(model_url.to_string(), Arc::downgrade(&lock));
        lock
    }
}

/// Clamp scalars and give the size field all four device keys.
fn normalize_value(field: &str, value: MetricValue) -> MetricValue {
    match value.sanitized() {
        MetricValue::Devices(map) => MetricValue::Devices(map.normalized()),
        MetricValue::Scalar(v) if field == SIZE_FIELD => {
            let fill = v.clamp(0.0, 1.0);
            MetricValue::Devices(Device::ALL.iter().map(|d| (*d, fill)).collect::<DeviceMap>())
        }
        scalar => scalar,
    }
}
