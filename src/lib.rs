pub mod api;
pub mod catalog;
pub mod engine;
pub mod errors;
pub mod models;
pub mod params;
pub mod queue;
pub mod redaction;
pub mod runner;
pub mod sink;
pub mod storage;
pub mod telemetry;
pub mod validation;

pub use engine::QueryEngine;
pub use errors::{CoreError, CoreResult};
pub use models::{
    AppSettings, BatchRunRequest, MergeMode, QueryConfiguration, QueryConfigurationItem,
    QueryDefinition, QueryParameterValues, QueueProgress, RunOutcome, RunnerOptions, WriteMode,
};
pub use queue::{BatchQueue, ItemRunner};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Installs the process-wide JSON log subscriber, writing through a
/// non-blocking daily-rolling file under `data_dir`. Call once at
/// startup, before constructing a [`QueryEngine`].
pub fn init_tracing(data_dir: &Path) -> CoreResult<()> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| CoreError::Storage(error.to_string()))?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "core.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| CoreError::Internal(error.to_string()))
}
