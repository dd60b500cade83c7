use super::{ApiFuture, QueryApi};
use crate::errors::CoreError;
use crate::models::{
    param_keys, ColumnInfo, QueryParameterValues, StatementResult, StatementState,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const DEFAULT_CHUNK_ROWS: usize = 50;

const GROUPS: &[&str] = &["Consumer", "Enterprise", "Public Sector"];
const SUB_GROUPS: &[&str] = &["North", "South", "East", "West"];
const STAGES: &[&str] = &["Prospect", "Qualified", "Committed", "Closed"];

#[derive(Debug, Clone)]
struct LiveStatement {
    state: StatementState,
    columns: Vec<ColumnInfo>,
    rows: Vec<Vec<Value>>,
}

/// In-memory statement-execution backend. Statements complete
/// synchronously against generated datasets; the seed is derived from
/// the statement and parameters so repeated executions agree. Results
/// larger than one chunk are served through `get_chunk`.
pub struct MockQueryApi {
    chunk_rows: usize,
    statements: Arc<Mutex<HashMap<String, LiveStatement>>>,
}

impl Default for MockQueryApi {
    fn default() -> Self {
        Self {
            chunk_rows: DEFAULT_CHUNK_ROWS,
            statements: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl MockQueryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_rows(chunk_rows: usize) -> Self {
        Self {
            chunk_rows: chunk_rows.max(1),
            statements: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn table_columns(table: &str) -> Option<Vec<ColumnInfo>> {
        let specs: &[(&str, &str)] = match table {
            "sales.daily_orders" => &[
                ("order_date", "DATE"),
                ("region", "STRING"),
                ("order_count", "LONG"),
                ("total_amount", "DOUBLE"),
            ],
            "finance.revenue_rollup" => &[
                ("month", "DATE"),
                ("customer_group", "STRING"),
                ("revenue", "DOUBLE"),
            ],
            "sales.pipeline" => &[
                ("opportunity_id", "STRING"),
                ("customer_group", "STRING"),
                ("sub_group", "STRING"),
                ("stage", "STRING"),
                ("amount", "DOUBLE"),
            ],
            "people.headcount_monthly" => &[
                ("month", "DATE"),
                ("customer_group", "STRING"),
                ("headcount", "LONG"),
            ],
            _ => return None,
        };
        Some(
            specs
                .iter()
                .map(|(name, type_name)| ColumnInfo {
                    name: name.to_string(),
                    type_name: type_name.to_string(),
                })
                .collect(),
        )
    }

    fn table_of(statement: &str) -> Option<String> {
        let lowered = statement.to_ascii_lowercase();
        let from = lowered.find(" from ")?;
        statement[from + 6..]
            .split_whitespace()
            .next()
            .map(|table| table.to_string())
    }

    fn seed_for(statement: &str, parameters: &QueryParameterValues) -> u64 {
        let mut hasher = DefaultHasher::new();
        statement.hash(&mut hasher);
        for (key, value) in parameters {
            key.hash(&mut hasher);
            value.hash(&mut hasher);
        }
        hasher.finish()
    }

    fn generate_rows(
        columns: &[ColumnInfo],
        parameters: &QueryParameterValues,
        rng: &mut StdRng,
    ) -> Vec<Vec<Value>> {
        let row_count = rng.random_range(20..=160);
        let base_date = parameters
            .get(param_keys::START_DATE)
            .cloned()
            .unwrap_or_else(|| "2024-01-01".to_string());

        (0..row_count)
            .map(|row| {
                columns
                    .iter()
                    .map(|column| Self::cell(column, row, &base_date, parameters, rng))
                    .collect()
            })
            .collect()
    }

    fn cell(
        column: &ColumnInfo,
        row: usize,
        base_date: &str,
        parameters: &QueryParameterValues,
        rng: &mut StdRng,
    ) -> Value {
        match column.name.as_str() {
            "order_date" | "month" => json!(format!("{} +{}d", base_date, row)),
            "region" => json!(SUB_GROUPS[row % SUB_GROUPS.len()]),
            "customer_group" => {
                let group = parameters
                    .get(param_keys::GROUP)
                    .cloned()
                    .unwrap_or_else(|| GROUPS[row % GROUPS.len()].to_string());
                json!(group)
            }
            "sub_group" => {
                let sub_group = parameters
                    .get(param_keys::SUB_GROUP)
                    .cloned()
                    .unwrap_or_else(|| SUB_GROUPS[row % SUB_GROUPS.len()].to_string());
                json!(sub_group)
            }
            "stage" => json!(STAGES[row % STAGES.len()]),
            "opportunity_id" => json!(format!("OPP-{:05}", row + 1)),
            "order_count" | "headcount" => json!(rng.random_range(1..500)),
            _ => json!((rng.random_range(100.0..250_000.0_f64) * 100.0).round() / 100.0),
        }
    }

    fn first_chunk_result(
        chunk_rows: usize,
        statement_id: &str,
        statement: &LiveStatement,
    ) -> StatementResult {
        let total_rows = statement.rows.len();
        let chunk: Vec<Vec<Value>> = statement.rows.iter().take(chunk_rows).cloned().collect();
        StatementResult {
            statement_id: statement_id.to_string(),
            state: StatementState::Succeeded,
            total_chunk_count: Some(total_rows.div_ceil(chunk_rows) as u32),
            total_row_count: Some(total_rows as u64),
            columns: Some(statement.columns.clone()),
            data: Some(chunk),
            chunk_index: Some(0),
            error_message: None,
        }
    }

    fn closed_result(statement_id: &str) -> StatementResult {
        StatementResult {
            statement_id: statement_id.to_string(),
            state: StatementState::Closed,
            total_chunk_count: None,
            total_row_count: None,
            columns: None,
            data: None,
            chunk_index: None,
            error_message: Some("Statement not found or cache expired.".to_string()),
        }
    }
}

impl QueryApi for MockQueryApi {
    fn execute_statement(
        &self,
        statement: String,
        parameters: QueryParameterValues,
    ) -> ApiFuture<StatementResult> {
        let chunk_rows = self.chunk_rows;
        let statements = self.statements.clone();
        Box::pin(async move {
            let statement_id = Uuid::new_v4().to_string();

            let Some(columns) = Self::table_of(&statement).and_then(|t| Self::table_columns(&t))
            else {
                return Ok(StatementResult::failed(
                    statement_id,
                    "TABLE_OR_VIEW_NOT_FOUND: statement references an unknown table",
                ));
            };

            let mut rng = StdRng::seed_from_u64(Self::seed_for(&statement, &parameters));
            let rows = Self::generate_rows(&columns, &parameters, &mut rng);
            let live = LiveStatement {
                state: StatementState::Succeeded,
                columns,
                rows,
            };

            let result = Self::first_chunk_result(chunk_rows, &statement_id, &live);

            let mut registry = statements.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            registry.insert(statement_id, live);
            Ok(result)
        })
    }

    fn get_statement_status(&self, statement_id: String) -> ApiFuture<StatementResult> {
        let statements = self.statements.clone();
        Box::pin(async move {
            let registry = statements.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let Some(live) = registry.get(&statement_id) else {
                return Ok(Self::closed_result(&statement_id));
            };
            Ok(StatementResult {
                statement_id,
                state: live.state,
                total_chunk_count: None,
                total_row_count: Some(live.rows.len() as u64),
                columns: Some(live.columns.clone()),
                data: None,
                chunk_index: None,
                error_message: None,
            })
        })
    }

    fn get_chunk(&self, statement_id: String, chunk_index: u32) -> ApiFuture<StatementResult> {
        let chunk_rows = self.chunk_rows;
        let statements = self.statements.clone();
        Box::pin(async move {
            let registry = statements.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let Some(live) = registry.get(&statement_id) else {
                return Ok(Self::closed_result(&statement_id));
            };
            if live.state != StatementState::Succeeded {
                return Ok(Self::closed_result(&statement_id));
            }

            let start = chunk_index as usize * chunk_rows;
            if start >= live.rows.len() {
                return Err(CoreError::InvalidRequest(format!(
                    "chunk {} is out of range for statement {}",
                    chunk_index, statement_id
                )));
            }
            let chunk: Vec<Vec<Value>> =
                live.rows.iter().skip(start).take(chunk_rows).cloned().collect();
            Ok(StatementResult {
                statement_id,
                state: StatementState::Succeeded,
                total_chunk_count: None,
                total_row_count: None,
                columns: None,
                data: Some(chunk),
                chunk_index: Some(chunk_index),
                error_message: None,
            })
        })
    }

    fn cancel_statement(&self, statement_id: String) -> ApiFuture<bool> {
        let statements = self.statements.clone();
        Box::pin(async move {
            let mut registry = statements.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            match registry.get_mut(&statement_id) {
                Some(live) => {
                    live.state = StatementState::Canceled;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }
}
