//! License clarity metric.

use crate::MetricDeps;
use async_trait::async_trait;
use modelgrade_core::clients::ModelInfo;
use modelgrade_core::error::MetricError;
use modelgrade_core::license;
use modelgrade_core::{Metric, MetricResult, MetricValue, measure};

pub const NAME: &str = "license";

pub struct LicenseMetric {
    deps: MetricDeps,
}

impl LicenseMetric {
    pub fn new(deps: MetricDeps) -> Self {
        Self { deps }
    }

    async fn evaluate(&self, model_url: &str) -> Result<MetricValue, MetricError> {
        let repo_id = self.deps.repo_id(model_url);
        let info = self.deps.hub.model_info(&repo_id).await?;
        let found = match declared_license(&info) {
            Some(id) => Some(id),
            None => self
                .deps
                .hub
                .readme(&repo_id)
                .await?
                .and_then(|text| license::from_readme(&text)),
        };
        tracing::debug!(repo = %repo_id, license = ?found, "Resolved license");
        Ok(MetricValue::Scalar(license::score(found.as_deref())))
    }
}

/// License from the card metadata, else from a `license:<id>` tag.
pub fn declared_license(info: &ModelInfo) -> Option<String> {
    if let Some(id) = info.card_str("license").map(str::trim).filter(|s| !s.is_empty()) {
        return Some(id.to_ascii_lowercase());
    }
    info.tags
        .iter()
        .find_map(|t| t.strip_prefix("license:"))
        .map(|id| id.trim().to_ascii_lowercase())
        .filter(|id| !id.is_empty())
}

#[async_trait]
impl Metric for LicenseMetric {
    fn name(&self) -> &str {
        NAME
    }

    async fn compute(&self, model_url: &str) -> MetricResult {
        measure(NAME, MetricValue::Scalar(0.0), self.evaluate(model_url)).await
    }
}
