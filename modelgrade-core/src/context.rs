//! URL Context Store: auxiliary code/dataset URLs for the model being scored.
//!
//! The orchestrator writes one entry per scoring invocation; metrics that need
//! a code repository or dataset reference read it back by model URL.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// The URLs associated with one model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Triplet {
    pub model: String,
    pub code: Option<String>,
    pub dataset: Option<String>,
}

/// Map from model URL to its [`Triplet`].
#[derive(Debug, Default)]
pub struct UrlContextStore {
    entries: RwLock<HashMap<String, Triplet>>,
}

impl UrlContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write (or overwrite) the entry for `model_url`. Blank URLs are stored as absent.
    pub fn set_context(&self, model_url: &str, code_url: Option<&str>, dataset_url: Option<&str>) {
        let triplet = Triplet {
            model: model_url.to_string(),
            code: non_blank(code_url),
            dataset: non_blank(dataset_url),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(model_url.to_string(), triplet);
    }

    pub fn get(&self, model_url: &str) -> Option<Triplet> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(model_url)
            .cloned()
    }

    pub fn get_code_url(&self, model_url: &str) -> Option<String> {
        self.get(model_url).and_then(|t| t.code)
    }

    pub fn get_dataset_url(&self, model_url: &str) -> Option<String> {
        self.get(model_url).and_then(|t| t.dataset)
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn non_blank(url: Option<&str>) -> Option<String> {
    url.map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
}
