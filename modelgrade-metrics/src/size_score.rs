//! Deployability of the model's weights on four device classes.

use crate::MetricDeps;
use async_trait::async_trait;
use modelgrade_core::error::MetricError;
use modelgrade_core::{Device, DeviceMap, Metric, MetricResult, MetricValue, measure};

pub const NAME: &str = "size_score";

/// Weight budget per device in decimal megabytes.
pub const CAPACITIES_MB: [(Device, f64); 4] = [
    (Device::RaspberryPi, 500.0),
    (Device::JetsonNano, 1500.0),
    (Device::DesktopPc, 8000.0),
    (Device::AwsServer, 16000.0),
];

/// Per-device score `clamp(1 - mb / capacity)`, rounded to two decimals.
pub fn scores_for_size(total_mb: f64) -> DeviceMap {
    CAPACITIES_MB
        .iter()
        .map(|(device, cap)| {
            let raw = (1.0 - total_mb / cap).clamp(0.0, 1.0);
            (*device, (raw * 100.0).round() / 100.0)
        })
        .collect()
}

pub struct SizeScoreMetric {
    deps: MetricDeps,
}

impl SizeScoreMetric {
    pub fn new(deps: MetricDeps) -> Self {
        Self { deps }
    }

    async fn evaluate(&self, model_url: &str) -> Result<MetricValue, MetricError> {
        let repo_id = self.deps.repo_id(model_url);
        let info = self.deps.hub.model_info(&repo_id).await?;
        let total_mb = info.weight_bytes() as f64 / 1_000_000.0;
        tracing::debug!(repo = %repo_id, total_mb, "Summed weight files");
        Ok(MetricValue::Devices(scores_for_size(total_mb)))
    }
}

#[async_trait]
impl Metric for SizeScoreMetric {
    fn name(&self) -> &str {
        NAME
    }

    async fn compute(&self, model_url: &str) -> MetricResult {
        let neutral = MetricValue::Devices(DeviceMap::new().normalized());
        measure(NAME, neutral, self.evaluate(model_url)).await
    }
}
