use crate::api::QueryApi;
use crate::catalog::QueryCatalog;
use crate::errors::CoreResult;
use crate::models::{QueryConfigurationItem, RunOutcome, RunnerOptions, StatementState};
use crate::queue::{ItemRunner, RunnerFuture};
use crate::sink::RowSink;
use crate::validation::validate_parameters;
use std::sync::Arc;

/// Executes one configured query end to end: parameter validation,
/// statement execution, chunk draining, row cap, then the write into
/// the target table. Failures come back as `ok: false` outcomes so the
/// queue can report them without aborting the batch.
pub struct QueryRunner {
    catalog: Arc<QueryCatalog>,
    api: Arc<dyn QueryApi>,
    sink: Arc<dyn RowSink>,
}

impl QueryRunner {
    pub fn new(catalog: Arc<QueryCatalog>, api: Arc<dyn QueryApi>, sink: Arc<dyn RowSink>) -> Self {
        Self { catalog, api, sink }
    }

    pub async fn run_item(
        &self,
        item: &QueryConfigurationItem,
        options: RunnerOptions,
    ) -> CoreResult<RunOutcome> {
        let Some(definition) = self.catalog.get_api_by_id(&item.api_id) else {
            tracing::warn!(item_id = %item.id, api_id = %item.api_id, "item references an unknown query definition");
            return Ok(RunOutcome {
                ok: false,
                row_count: 0,
            });
        };

        let validation = validate_parameters(definition, &item.parameters);
        if !validation.is_ok() {
            tracing::warn!(
                item_id = %item.id,
                api_id = %item.api_id,
                errors = ?validation.errors,
                "parameter validation failed; statement not executed"
            );
            return Ok(RunOutcome {
                ok: false,
                row_count: 0,
            });
        }

        let result = self
            .api
            .execute_statement(definition.statement.clone(), item.parameters.clone())
            .await?;
        if result.state != StatementState::Succeeded {
            let message = result
                .error_message
                .unwrap_or_else(|| format!("statement ended in state {}", result.state.as_str()));
            tracing::warn!(item_id = %item.id, message, "statement execution failed");
            return Ok(RunOutcome {
                ok: false,
                row_count: 0,
            });
        }

        let columns = result.columns.unwrap_or_default();
        let mut rows = result.data.unwrap_or_default();
        let row_cap = options.max_rows_per_item.map(|max| max as usize);
        let total_chunks = result.total_chunk_count.unwrap_or(1);

        for chunk_index in 1..total_chunks {
            if row_cap.is_some_and(|cap| rows.len() >= cap) {
                break;
            }
            let chunk = self
                .api
                .get_chunk(result.statement_id.clone(), chunk_index)
                .await?;
            if chunk.state != StatementState::Succeeded {
                tracing::warn!(
                    item_id = %item.id,
                    chunk_index,
                    state = chunk.state.as_str(),
                    "result chunk no longer available"
                );
                return Ok(RunOutcome {
                    ok: false,
                    row_count: 0,
                });
            }
            rows.extend(chunk.data.unwrap_or_default());
        }

        if let Some(cap) = row_cap {
            rows.truncate(cap);
        }

        let written = self
            .sink
            .write_rows(&item.target(), item.write_mode, &columns, &rows)?;
        tracing::debug!(
            item_id = %item.id,
            write_mode = item.write_mode.as_str(),
            rows = written,
            "item rows written"
        );
        Ok(RunOutcome {
            ok: true,
            row_count: written,
        })
    }

    /// Adapts this runner into the closure shape the queue consumes.
    pub fn item_runner(self: Arc<Self>) -> ItemRunner {
        let runner = self;
        Arc::new(move |item, options| -> RunnerFuture {
            let runner = runner.clone();
            Box::pin(async move { runner.run_item(&item, options).await })
        })
    }
}
