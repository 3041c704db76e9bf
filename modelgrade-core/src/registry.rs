//! Metric Registry: ordered collection of metric descriptors.
//!
//! Metrics are registered at startup and iterated in insertion order when a
//! model is scored. The registry is append-only while scoring runs; the
//! evaluator works on a snapshot taken by [`MetricRegistry::registered`].

use crate::error::MetricError;
use crate::types::{MetricResult, MetricValue};
use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tracing::{debug, warn};

/// Trait that all metrics must implement.
///
/// `compute` is total: implementations convert their own failures into a
/// neutral value (see [`measure`]) and always report a latency.
#[async_trait]
pub trait Metric: Send + Sync {
    /// Human-readable metric name.
    fn name(&self) -> &str;

    /// Key under which the value appears in the output record.
    fn output_field(&self) -> &str {
        self.name()
    }

    /// Score the model at `model_url`.
    async fn compute(&self, model_url: &str) -> MetricResult;
}

/// An immutable registry entry.
#[derive(Clone)]
pub struct MetricDescriptor {
    pub name: String,
    pub output_field: String,
    pub compute: Arc<dyn Metric>,
}

impl std::fmt::Debug for MetricDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricDescriptor")
            .field("name", &self.name)
            .field("output_field", &self.output_field)
            .finish()
    }
}

/// Insertion-ordered, thread-safe set of metric descriptors.
#[derive(Default)]
pub struct MetricRegistry {
    descriptors: RwLock<Vec<MetricDescriptor>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a descriptor. Duplicate `(name, output_field)` pairs are kept;
    /// two descriptors sharing an `output_field` expose one computation under
    /// an alias.
    pub fn register(
        &self,
        name: impl Into<String>,
        output_field: impl Into<String>,
        compute: Arc<dyn Metric>,
    ) {
        let descriptor = MetricDescriptor {
            name: name.into(),
            output_field: output_field.into(),
            compute,
        };
        debug!(
            metric = %descriptor.name,
            field = %descriptor.output_field,
            "Registering metric"
        );
        self.descriptors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(descriptor);
    }

    /// Register a metric under its own name and output field.
    pub fn register_metric(&self, metric: Arc<dyn Metric>) {
        let name = metric.name().to_string();
        let field = metric.output_field().to_string();
        self.register(name, field, metric);
    }

    /// Snapshot of all descriptors in insertion order.
    pub fn registered(&self) -> Vec<MetricDescriptor> {
        self.descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Distinct output fields in first-registration order.
    pub fn output_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for d in self.registered() {
            if !fields.contains(&d.output_field) {
                fields.push(d.output_field);
            }
        }
        fields
    }

    pub fn len(&self) -> usize {
        self.descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every descriptor.
    pub fn clear_for_tests(&self) {
        self.descriptors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Run a fallible scoring future, timing it and applying the metric contract:
/// scalars are clamped, errors are logged and replaced by `neutral`.
pub async fn measure<F>(metric: &str, neutral: MetricValue, fut: F) -> MetricResult
where
    F: Future<Output = Result<MetricValue, MetricError>>,
{
    let start = Instant::now();
    let value = match fut.await {
        Ok(value) => value.sanitized(),
        Err(e) => {
            warn!(metric = %metric, error = %e, "Metric failed, using neutral value");
            neutral
        }
    };
    MetricResult::new(value, elapsed_ms(start))
}

/// Milliseconds since `start`, rounded.
pub fn elapsed_ms(start: Instant) -> u64 {
    (start.elapsed().as_secs_f64() * 1000.0).round() as u64
}

/// Metric backed by an async closure. Handy for ad-hoc and test metrics.
pub struct FnMetric<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> Metric for FnMetric<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = MetricResult> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn compute(&self, model_url: &str) -> MetricResult {
        (self.f)(model_url.to_string()).await
    }
}

/// Wrap an async closure as a metric.
pub fn metric_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn Metric>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MetricResult> + Send + 'static,
{
    Arc::new(FnMetric {
        name: name.into(),
        f,
    })
}
