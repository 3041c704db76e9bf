//! Whether the model card's example code can be run as written.

use crate::{MetricDeps, source};
use async_trait::async_trait;
use modelgrade_core::error::MetricError;
use modelgrade_core::{Metric, MetricResult, MetricValue, measure};
use regex::Regex;
use std::sync::LazyLock;

pub const NAME: &str = "reproducibility";

struct ReadmePatterns {
    snippet: Regex,
    import: Regex,
    construct: Regex,
    inference: Regex,
}

static PATTERNS: LazyLock<Option<ReadmePatterns>> = LazyLock::new(|| {
    Some(ReadmePatterns {
        snippet: Regex::new(
            r"(?i)```python|```py|from transformers import|import torch|model = |tokenizer = ",
        )
        .ok()?,
        import: Regex::new(r"(?:from|import)\s+\w+").ok()?,
        construct: Regex::new(r"(?i)(?:model|tokenizer)\s*=").ok()?,
        inference: Regex::new(r"predict|generate|forward|\(.*\)").ok()?,
    })
});

/// How runnable the README looks on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadmeCode {
    None,
    Snippets,
    Runnable,
}

pub fn classify_readme(text: &str) -> ReadmeCode {
    let Some(p) = PATTERNS.as_ref() else {
        return ReadmeCode::None;
    };
    if p.import.is_match(text) && p.construct.is_match(text) && p.inference.is_match(text) {
        ReadmeCode::Runnable
    } else if p.snippet.is_match(text) {
        ReadmeCode::Snippets
    } else {
        ReadmeCode::None
    }
}

/// 1.0 for a runnable example with declared dependencies, 0.5 for code that
/// will need some work, 0.0 otherwise.
pub fn reproducibility_score(readme: ReadmeCode, has_dependencies: bool) -> f64 {
    match (readme, has_dependencies) {
        (ReadmeCode::Runnable, true) => 1.0,
        (ReadmeCode::Runnable, false) | (ReadmeCode::Snippets, _) => 0.5,
        (ReadmeCode::None, _) => 0.0,
    }
}

pub struct ReproducibilityMetric {
    deps: MetricDeps,
}

impl ReproducibilityMetric {
    pub fn new(deps: MetricDeps) -> Self {
        Self { deps }
    }

    async fn evaluate(&self, model_url: &str) -> Result<MetricValue, MetricError> {
        let repo_id = self.deps.repo_id(model_url);
        let Some(readme) = self.deps.hub.readme(&repo_id).await? else {
            return Ok(MetricValue::Scalar(0.0));
        };
        let info = self.deps.hub.model_info(&repo_id).await?;
        let files: Vec<&str> = info.file_names().collect();
        let has_dependencies = source::DEPENDENCY_FILES
            .iter()
            .any(|name| source::has_file(&files, name));
        let class = classify_readme(&readme);
        tracing::debug!(repo = %repo_id, readme = ?class, has_dependencies, "Classified README");
        Ok(MetricValue::Scalar(reproducibility_score(class, has_dependencies)))
    }
}

#[async_trait]
impl Metric for ReproducibilityMetric {
    fn name(&self) -> &str {
        NAME
    }

    async fn compute(&self, model_url: &str) -> MetricResult {
        measure(NAME, MetricValue::Scalar(0.0), self.evaluate(model_url)).await
    }
}
