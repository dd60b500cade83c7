use crate::redaction::Redactor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

pub const EVENT_QUEUE_STARTED: &str = "query.queue.started";
pub const EVENT_QUEUE_COMPLETED: &str = "query.queue.completed";
pub const EVENT_QUEUE_REJECTED: &str = "query.queue.rejected";
pub const EVENT_QUEUE_FAILED: &str = "query.queue.failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub category: String,
    pub name: String,
    pub severity: Severity,
    pub message: Option<String>,
    pub context: Option<serde_json::Value>,
    pub occurred_at: DateTime<Utc>,
}

impl TelemetryEvent {
    pub fn new(category: &str, name: &str, severity: Severity) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            severity,
            message: None,
            context: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}

pub trait TelemetrySink: Send + Sync {
    fn log_event(&self, event: TelemetryEvent);
}

/// Forwards events to the structured log, scrubbing secret-shaped
/// content first when redaction is enabled.
pub struct TracingSink {
    redactor: Option<Redactor>,
}

impl TracingSink {
    pub fn new(redact: bool) -> Self {
        Self {
            redactor: redact.then(Redactor::new),
        }
    }
}

impl TelemetrySink for TracingSink {
    fn log_event(&self, mut event: TelemetryEvent) {
        if let Some(redactor) = &self.redactor {
            if let Some(message) = event.message.take() {
                event.message = Some(redactor.redact(&message).content);
            }
            if let Some(context) = event.context.as_mut() {
                redactor.redact_value(context);
            }
        }

        let detail = event.message.as_deref().unwrap_or("");
        let context = event
            .context
            .as_ref()
            .map(|value| value.to_string())
            .unwrap_or_default();
        match event.severity {
            Severity::Info => {
                tracing::info!(category = %event.category, name = %event.name, detail, context, "telemetry")
            }
            Severity::Warning => {
                tracing::warn!(category = %event.category, name = %event.name, detail, context, "telemetry")
            }
            Severity::Error => {
                tracing::error!(category = %event.category, name = %event.name, detail, context, "telemetry")
            }
        }
    }
}

/// Captures events in memory so tests can assert on what was reported.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        let events = self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        events.clone()
    }

    pub fn named(&self, name: &str) -> Vec<TelemetryEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.name == name)
            .collect()
    }
}

impl TelemetrySink for MemorySink {
    fn log_event(&self, event: TelemetryEvent) {
        let mut events = self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event);
    }
}
