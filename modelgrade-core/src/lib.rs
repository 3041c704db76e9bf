//! # Modelgrade Core
//!
//! Scoring engine for machine-learning model repositories.
//! Provides the metric registry, per-URL context store, parallel evaluator,
//! weighted combiner and orchestrator, plus the upstream clients, artifact
//! store and HTTP gateway built around them.

pub mod clients;
pub mod combiner;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod gateway;
pub mod license;
pub mod logging;
pub mod orchestrator;
pub mod registry;
pub mod store;
pub mod types;
pub mod url;

// Re-export commonly used types at the crate root.
pub use combiner::{Combiner, default_weights};
pub use config::{ModelgradeConfig, load_config};
pub use context::{Triplet, UrlContextStore};
pub use error::{ClientError, MetricError, ModelgradeError, Result, StoreError, UrlError};
pub use evaluator::{MetricTask, run_parallel};
pub use orchestrator::Orchestrator;
pub use registry::{Metric, MetricDescriptor, MetricRegistry, measure, metric_fn};
pub use store::ArtifactStore;
pub use types::{Device, DeviceMap, FieldScore, MetricResult, MetricValue, ScoreRecord};
pub use url::{ArtifactKind, UrlClassifier};
