use serde_json::json;
use sheetquery::api::mock::MockQueryApi;
use sheetquery::catalog::QueryCatalog;
use sheetquery::models::{
    QueryConfiguration, QueryConfigurationItem, QueryParameterValues, QueueProgress, SheetTarget,
    WriteMode,
};
use sheetquery::sink::MemoryRowSink;
use sheetquery::storage::sqlite::SqliteStore;
use sheetquery::storage::Storage;
use sheetquery::telemetry::{self, MemorySink};
use sheetquery::QueryEngine;
use std::path::Path;
use std::sync::Arc;

fn engine_over(
    db_path: &Path,
    sink: Arc<MemoryRowSink>,
    events: Arc<MemorySink>,
) -> QueryEngine {
    let storage = Storage::new(Arc::new(SqliteStore::new(db_path).expect("open sqlite store")));
    QueryEngine::with_parts(
        storage,
        Arc::new(QueryCatalog::builtin()),
        Arc::new(MockQueryApi::new()),
        sink,
        events,
    )
}

fn item(id: &str, api_id: &str, table: &str) -> QueryConfigurationItem {
    QueryConfigurationItem {
        id: id.to_string(),
        api_id: api_id.to_string(),
        display_name: id.to_string(),
        target_sheet_name: "Report".to_string(),
        target_table_name: table.to_string(),
        write_mode: WriteMode::Overwrite,
        include_in_batch: true,
        parameters: QueryParameterValues::new(),
    }
}

fn params(pairs: &[(&str, &str)]) -> QueryParameterValues {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[tokio::test]
async fn full_batch_flow_over_sqlite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("core.db");
    let sink = Arc::new(MemoryRowSink::new());
    let events = Arc::new(MemorySink::new());
    let engine = engine_over(&db_path, sink.clone(), events.clone());

    engine
        .update_settings(json!({ "defaultMergeMode": "unique", "batchBackoffMs": 5 }))
        .expect("update settings");

    engine.params().set_global_params(params(&[
        ("StartDate", "2024-01-01"),
        ("EndDate", "2024-03-31"),
        ("Group", "All"),
    ]));
    engine
        .params()
        .set_query_params("revenue-by-group", params(&[("Group", "Consumer")]));

    engine.save_configuration(QueryConfiguration {
        id: "quarterly".to_string(),
        name: "Quarterly refresh".to_string(),
        items: vec![
            item("i-sales", "sales-summary", "SalesSummary"),
            item("i-revenue", "revenue-by-group", "RevenueByGroup"),
            item("i-broken", "does-not-exist", "Broken"),
        ],
    });

    let mut progress_rx = engine.subscribe_progress();
    engine
        .run_configuration("quarterly")
        .await
        .expect("run configuration");

    // Both valid items landed in their target tables.
    let sales = sink
        .table(&SheetTarget {
            sheet_name: "Report".to_string(),
            table_name: "SalesSummary".to_string(),
        })
        .expect("sales table");
    assert!(!sales.rows.is_empty());

    let revenue = sink
        .table(&SheetTarget {
            sheet_name: "Report".to_string(),
            table_name: "RevenueByGroup".to_string(),
        })
        .expect("revenue table");
    // The per-query override beat the global group.
    assert!(revenue
        .rows
        .iter()
        .all(|row| row[1] == serde_json::json!("Consumer")));

    // The broken item was reported and did not abort the batch.
    let failures = events.named(telemetry::EVENT_QUEUE_FAILED);
    assert_eq!(failures.len(), 1);
    assert_eq!(
        failures[0].context.as_ref().expect("context")["itemId"],
        "i-broken"
    );
    assert_eq!(events.named(telemetry::EVENT_QUEUE_REJECTED).len(), 0);

    // Progress ran to completion and reset to idle.
    let mut observed = Vec::new();
    while let Ok(progress) = progress_rx.try_recv() {
        observed.push(progress);
    }
    let last_running = observed
        .iter()
        .rev()
        .find(|progress| progress.config_id.is_some())
        .expect("running progress");
    assert_eq!(last_running.completed, 3);
    assert_eq!(last_running.total, 3);
    assert_eq!(observed.last(), Some(&QueueProgress::idle()));
    assert!(!engine.queue().is_running());
}

#[tokio::test]
async fn settings_and_parameters_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("core.db");

    {
        let engine = engine_over(
            &db_path,
            Arc::new(MemoryRowSink::new()),
            Arc::new(MemorySink::new()),
        );
        engine
            .update_settings(json!({ "maxRowsPerItem": 100 }))
            .expect("update settings");
        engine
            .params()
            .set_global_params(params(&[("Group", "Enterprise")]));
        engine.params().set_query_run_flag("sales-summary", true);
    }

    let engine = engine_over(
        &db_path,
        Arc::new(MemoryRowSink::new()),
        Arc::new(MemorySink::new()),
    );
    assert_eq!(engine.settings().max_rows_per_item, Some(100));
    assert_eq!(
        engine.params().global_params().get("Group").map(String::as_str),
        Some("Enterprise")
    );
    assert!(engine.params().query_run_flag("sales-summary"));
}
