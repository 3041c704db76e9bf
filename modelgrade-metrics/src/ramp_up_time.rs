//! Ramp-up time: an LLM rating of how quickly a newcomer can start using the
//! model from its README.

use crate::MetricDeps;
use async_trait::async_trait;
use modelgrade_core::error::MetricError;
use modelgrade_core::{Metric, MetricResult, MetricValue, measure};
use regex::Regex;
use std::sync::LazyLock;

pub const NAME: &str = "ramp_up_time";

/// README characters sent to the model.
pub const README_CHARS: usize = 4000;

const SYSTEM_PROMPT: &str = "You are a strict evaluator of documentation clarity.";
const USER_PROMPT: &str = "Rate the clarity and completeness of this README in a single number \
between 0 (worst) and 1 (best). Respond with just the number.";

static UNIT_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(0(?:\.\d+)?|1(?:\.0+)?)\b").ok());

/// Score from a free-text reply: the whole reply as a number, else the first
/// number in `[0, 1]` it contains, else `0.0`. Clamped.
pub fn parse_rating(reply: &str) -> f64 {
    let direct = reply.trim().parse::<f64>().ok().filter(|v| v.is_finite());
    let value = direct.or_else(|| {
        UNIT_NUMBER
            .as_ref()?
            .captures(reply)?
            .get(1)?
            .as_str()
            .parse()
            .ok()
    });
    value.unwrap_or(0.0).clamp(0.0, 1.0)
}

pub struct RampUpTimeMetric {
    deps: MetricDeps,
}

impl RampUpTimeMetric {
    pub fn new(deps: MetricDeps) -> Self {
        Self { deps }
    }

    async fn evaluate(&self, model_url: &str) -> Result<MetricValue, MetricError> {
        let repo_id = self.deps.repo_id(model_url);
        let Some(readme) = self.deps.hub.readme(&repo_id).await? else {
            return Ok(MetricValue::Scalar(0.0));
        };
        let excerpt: String = readme.chars().take(README_CHARS).collect();
        let prompt = format!("{USER_PROMPT}\n\n{excerpt}");
        let reply = self.deps.llm.ask(SYSTEM_PROMPT, &prompt).await?;
        Ok(MetricValue::Scalar(parse_rating(&reply)))
    }
}

#[async_trait]
impl Metric for RampUpTimeMetric {
    fn name(&self) -> &str {
        NAME
    }

    async fn compute(&self, model_url: &str) -> MetricResult {
        measure(NAME, MetricValue::Scalar(0.0), self.evaluate(model_url)).await
    }
}
