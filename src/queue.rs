use crate::errors::CoreResult;
use crate::models::{
    BatchRunRequest, QueryConfigurationItem, QueueProgress, RunOutcome, RunnerOptions,
};
use crate::telemetry::{self, Severity, TelemetryEvent, TelemetrySink};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tokio::time::Duration;

pub type RunnerFuture = Pin<Box<dyn Future<Output = CoreResult<RunOutcome>> + Send>>;
pub type ItemRunner = Arc<dyn Fn(QueryConfigurationItem, RunnerOptions) -> RunnerFuture + Send + Sync>;

const TELEMETRY_CATEGORY: &str = "query.queue";
const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Executes one batch of query items at a time, strictly in input
/// order, against a caller-supplied runner. A second `run_batch` call
/// while one is active is dropped, not queued. Per-item failures are
/// reported through telemetry and never abort the batch.
pub struct BatchQueue {
    is_running: AtomicBool,
    progress: RwLock<QueueProgress>,
    progress_tx: broadcast::Sender<QueueProgress>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl BatchQueue {
    pub fn new(telemetry: Arc<dyn TelemetrySink>) -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            is_running: AtomicBool::new(false),
            progress: RwLock::new(QueueProgress::idle()),
            progress_tx,
            telemetry,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueProgress> {
        self.progress_tx.subscribe()
    }

    pub fn progress(&self) -> QueueProgress {
        self.progress.read().expect("progress read lock").clone()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub async fn run_batch(&self, request: BatchRunRequest, runner: ItemRunner) {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.telemetry.log_event(
                TelemetryEvent::new(
                    TELEMETRY_CATEGORY,
                    telemetry::EVENT_QUEUE_REJECTED,
                    Severity::Warning,
                )
                .with_message("a batch is already running; dropping the incoming request")
                .with_context(json!({ "configId": request.config_id })),
            );
            return;
        }

        let total = request.items.len();
        self.telemetry.log_event(
            TelemetryEvent::new(
                TELEMETRY_CATEGORY,
                telemetry::EVENT_QUEUE_STARTED,
                Severity::Info,
            )
            .with_context(json!({ "configId": request.config_id, "total": total })),
        );
        self.publish(QueueProgress {
            config_id: Some(request.config_id.clone()),
            total,
            completed: 0,
            current_item_id: None,
        });

        let options = RunnerOptions {
            max_rows_per_item: request.max_rows_per_item,
        };
        let mut completed = 0usize;
        for (index, item) in request.items.iter().enumerate() {
            self.publish(QueueProgress {
                config_id: Some(request.config_id.clone()),
                total,
                completed,
                current_item_id: Some(item.id.clone()),
            });

            match runner(item.clone(), options).await {
                Ok(RunOutcome { ok: true, row_count }) => {
                    tracing::debug!(item_id = %item.id, row_count, "batch item completed");
                }
                Ok(RunOutcome { ok: false, .. }) => {
                    self.report_item_failure(&request.config_id, item, None);
                }
                Err(error) => {
                    self.report_item_failure(&request.config_id, item, Some(error.to_string()));
                }
            }

            // Failed items still count as processed; they are not retried.
            completed += 1;
            self.publish(QueueProgress {
                config_id: Some(request.config_id.clone()),
                total,
                completed,
                current_item_id: None,
            });

            if let Some(backoff_ms) = request.backoff_ms {
                if index + 1 < total {
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }

        self.telemetry.log_event(
            TelemetryEvent::new(
                TELEMETRY_CATEGORY,
                telemetry::EVENT_QUEUE_COMPLETED,
                Severity::Info,
            )
            .with_context(json!({ "configId": request.config_id, "total": total })),
        );
        self.publish(QueueProgress::idle());
        self.is_running.store(false, Ordering::SeqCst);
    }

    fn report_item_failure(
        &self,
        config_id: &str,
        item: &QueryConfigurationItem,
        error: Option<String>,
    ) {
        let mut context = json!({
            "configId": config_id,
            "itemId": item.id,
            "apiId": item.api_id,
        });
        if let Some(error) = &error {
            context["error"] = json!(error);
        }
        self.telemetry.log_event(
            TelemetryEvent::new(
                TELEMETRY_CATEGORY,
                telemetry::EVENT_QUEUE_FAILED,
                Severity::Warning,
            )
            .with_message(format!("item {} failed", item.id))
            .with_context(context),
        );
    }

    fn publish(&self, progress: QueueProgress) {
        {
            let mut current = self.progress.write().expect("progress write lock");
            *current = progress.clone();
        }
        // Send only fails when no subscriber is listening, which is fine.
        let _ = self.progress_tx.send(progress);
    }
}
