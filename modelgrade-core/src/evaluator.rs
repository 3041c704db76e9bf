//! Parallel Evaluator: runs every metric task for one model concurrently.
//!
//! Tasks are spawned onto the runtime behind a semaphore of the configured
//! width and collected in completion order against a single deadline. The
//! returned map always covers every submitted field: panics and deadline
//! misses are recorded as [`MetricResult::neutral`].

use crate::types::MetricResult;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Default number of metrics evaluated at once.
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// One unit of work: the output field and the bound metric future.
pub type MetricTask = (String, BoxFuture<'static, MetricResult>);

/// Run all `tasks` with at most `max_workers` in flight, giving up on whatever
/// has not finished once `timeout` has elapsed.
pub async fn run_parallel(
    tasks: Vec<MetricTask>,
    timeout: Duration,
    max_workers: usize,
) -> HashMap<String, MetricResult> {
    if tasks.is_empty() {
        return HashMap::new();
    }

    let deadline = tokio::time::Instant::now() + timeout;
    let fields: Vec<String> = tasks.iter().map(|(field, _)| field.clone()).collect();
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut set = JoinSet::new();

    for (field, task) in tasks {
        let sem = semaphore.clone();
        set.spawn(async move {
            // The semaphore is never closed, so acquisition only fails on shutdown.
            let _permit = sem.acquire_owned().await.ok();
            let result = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(result) => result,
                Err(_) => {
                    warn!(field = %field, "Metric task panicked, using neutral value");
                    MetricResult::neutral()
                }
            };
            (field, result)
        });
    }

    let mut results = HashMap::with_capacity(fields.len());
    loop {
        match tokio::time::timeout_at(deadline, set.join_next()).await {
            Ok(Some(Ok((field, result)))) => {
                debug!(field = %field, latency_ms = result.latency_ms, "Metric finished");
                results.insert(field, result);
            }
            Ok(Some(Err(e))) => {
                warn!(error = %e, "Metric task did not complete");
            }
            Ok(None) => break,
            Err(_) => {
                warn!(
                    pending = set.len(),
                    timeout_secs = timeout.as_secs_f64(),
                    "Evaluation deadline reached, abandoning unfinished metrics"
                );
                set.abort_all();
                break;
            }
        }
    }

    for field in fields {
        results.entry(field).or_insert_with(MetricResult::neutral);
    }
    results
}
