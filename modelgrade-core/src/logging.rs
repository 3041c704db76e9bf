//! Logging bootstrap driven by `LOG_FILE` and `LOG_LEVEL`.
//!
//! `LOG_LEVEL` is `0` (silent), `1` (info) or `2` (debug). Output goes to
//! `LOG_FILE` when set and writable, otherwise to stderr. `RUST_LOG`, when
//! present, replaces the level-derived filter.

use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const LOG_FILE_VAR: &str = "LOG_FILE";
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: u8,
    pub file: Option<PathBuf>,
}

impl LogSettings {
    /// Read `LOG_LEVEL` / `LOG_FILE`, falling back to `default_level`.
    pub fn from_env(default_level: u8) -> Self {
        let level = std::env::var(LOG_LEVEL_VAR).ok();
        let file = std::env::var(LOG_FILE_VAR).ok();
        Self::from_values(level.as_deref(), file.as_deref(), default_level)
    }

    pub fn from_values(level: Option<&str>, file: Option<&str>, default_level: u8) -> Self {
        let level = match level.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw.parse::<u8>().map(|l| l.min(2)).unwrap_or(0),
            _ => default_level.min(2),
        };
        let file = file
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(PathBuf::from);
        Self { level, file }
    }

    /// Filter directive for the configured level, `None` when silent.
    pub fn directive(&self) -> Option<&'static str> {
        match self.level {
            0 => None,
            1 => Some("info"),
            _ => Some("debug"),
        }
    }
}

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process so buffered lines are flushed.
pub fn init_logging(settings: &LogSettings) -> Option<WorkerGuard> {
    let directive = settings.directive()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let mut fallback_reason = None;
    let (writer, guard, to_file) = match &settings.file {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                let (nb, guard) = tracing_appender::non_blocking(file);
                (nb, guard, true)
            }
            Err(e) => {
                fallback_reason = Some(format!("{}: {e}", path.display()));
                let (nb, guard) = tracing_appender::non_blocking(std::io::stderr());
                (nb, guard, false)
            }
        },
        None => {
            let (nb, guard) = tracing_appender::non_blocking(std::io::stderr());
            (nb, guard, false)
        }
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(!to_file)
        .with_target(false);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();

    if let Some(reason) = fallback_reason {
        tracing::warn!(reason = %reason, "Cannot open LOG_FILE, logging to stderr");
    }
    Some(guard)
}
