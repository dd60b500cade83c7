use crate::api::mock::MockQueryApi;
use crate::api::QueryApi;
use crate::catalog::QueryCatalog;
use crate::errors::{CoreError, CoreResult};
use crate::models::{AppSettings, BatchRunRequest, QueryConfiguration, QueueProgress};
use crate::params::ParameterStore;
use crate::queue::BatchQueue;
use crate::runner::QueryRunner;
use crate::sink::{MemoryRowSink, RowSink};
use crate::storage::sqlite::SqliteStore;
use crate::storage::Storage;
use crate::telemetry::{TelemetrySink, TracingSink};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

const SETTINGS_KEY: &str = "appSettings";
const CONFIGURATIONS_KEY: &str = "queryConfigurations";

/// One instance per session: owns the catalog, parameter store, queue
/// and runner, and the settings/configuration persistence. All
/// collaborators are injected at construction; nothing is looked up
/// through ambient globals.
pub struct QueryEngine {
    catalog: Arc<QueryCatalog>,
    storage: Storage,
    params: ParameterStore,
    queue: Arc<BatchQueue>,
    runner: Arc<QueryRunner>,
}

impl QueryEngine {
    /// Default wiring: sqlite persistence under `data_dir`, the
    /// built-in catalog, the mock statement backend, an in-memory row
    /// sink, and telemetry into the structured log.
    pub fn new(data_dir: &Path) -> CoreResult<Self> {
        let storage = Storage::new(Arc::new(SqliteStore::new(&data_dir.join("core.db"))?));
        let settings: AppSettings = storage.get_item(SETTINGS_KEY, AppSettings::default());
        let telemetry: Arc<dyn TelemetrySink> =
            Arc::new(TracingSink::new(settings.redact_telemetry));
        Ok(Self::with_parts(
            storage,
            Arc::new(QueryCatalog::builtin()),
            Arc::new(MockQueryApi::new()),
            Arc::new(MemoryRowSink::new()),
            telemetry,
        ))
    }

    pub fn with_parts(
        storage: Storage,
        catalog: Arc<QueryCatalog>,
        api: Arc<dyn QueryApi>,
        sink: Arc<dyn RowSink>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        let params = ParameterStore::new(storage.clone());
        let queue = Arc::new(BatchQueue::new(telemetry));
        let runner = Arc::new(QueryRunner::new(catalog.clone(), api, sink));
        Self {
            catalog,
            storage,
            params,
            queue,
            runner,
        }
    }

    pub fn catalog(&self) -> &QueryCatalog {
        &self.catalog
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn queue(&self) -> &BatchQueue {
        &self.queue
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<QueueProgress> {
        self.queue.subscribe()
    }

    pub fn settings(&self) -> AppSettings {
        self.storage.get_item(SETTINGS_KEY, AppSettings::default())
    }

    pub fn update_settings(&self, update: serde_json::Value) -> CoreResult<AppSettings> {
        let mut merged = serde_json::to_value(self.settings())?;
        merge_shallow(&mut merged, update);
        let settings: AppSettings = serde_json::from_value(merged)?;
        self.storage.set_item(SETTINGS_KEY, &settings);
        Ok(settings)
    }

    pub fn list_configurations(&self) -> Vec<QueryConfiguration> {
        self.storage.get_item(CONFIGURATIONS_KEY, Vec::new())
    }

    pub fn get_configuration(&self, config_id: &str) -> Option<QueryConfiguration> {
        self.list_configurations()
            .into_iter()
            .find(|config| config.id == config_id)
    }

    pub fn save_configuration(&self, config: QueryConfiguration) {
        let mut configs = self.list_configurations();
        match configs.iter_mut().find(|existing| existing.id == config.id) {
            Some(existing) => *existing = config,
            None => configs.push(config),
        }
        self.storage.set_item(CONFIGURATIONS_KEY, &configs);
    }

    pub fn delete_configuration(&self, config_id: &str) -> bool {
        let mut configs = self.list_configurations();
        let before = configs.len();
        configs.retain(|config| config.id != config_id);
        let removed = configs.len() != before;
        if removed {
            self.storage.set_item(CONFIGURATIONS_KEY, &configs);
        }
        removed
    }

    /// Assembles a run request from a saved configuration: included
    /// items only, each with its parameters resolved under the current
    /// default merge mode, plus the session's pacing and row-cap
    /// settings.
    pub fn batch_request(&self, config_id: &str) -> CoreResult<BatchRunRequest> {
        let Some(config) = self.get_configuration(config_id) else {
            return Err(CoreError::NotFound(format!(
                "no stored configuration {}",
                config_id
            )));
        };
        let settings = self.settings();
        tracing::debug!(
            config_id,
            merge_mode = settings.default_merge_mode.as_str(),
            "assembling batch request"
        );

        let mut items = Vec::new();
        for mut item in config.items.into_iter() {
            if !item.include_in_batch {
                continue;
            }
            // Items pointing at an unknown definition keep their saved
            // parameters; the runner reports them as failed.
            if let Some(definition) = self.catalog.get_api_by_id(&item.api_id) {
                item.parameters =
                    self.params.effective_params(definition, settings.default_merge_mode);
            }
            items.push(item);
        }

        Ok(BatchRunRequest {
            config_id: config_id.to_string(),
            items,
            backoff_ms: settings.batch_backoff_ms,
            max_rows_per_item: settings.max_rows_per_item,
        })
    }

    pub async fn run_configuration(&self, config_id: &str) -> CoreResult<()> {
        let request = self.batch_request(config_id)?;
        self.queue.run_batch(request, self.runner.clone().item_runner()).await;
        Ok(())
    }

    pub async fn run_batch(&self, request: BatchRunRequest) {
        self.queue.run_batch(request, self.runner.clone().item_runner()).await;
    }
}

fn merge_shallow(base: &mut serde_json::Value, update: serde_json::Value) {
    match (base, update) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                base_map.insert(key, value);
            }
        }
        (base_slot, update) => *base_slot = update,
    }
}
