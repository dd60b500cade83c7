use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known parameter keys shared by the built-in query definitions.
pub mod param_keys {
    pub const START_DATE: &str = "StartDate";
    pub const END_DATE: &str = "EndDate";
    pub const GROUP: &str = "Group";
    pub const SUB_GROUP: &str = "SubGroup";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamType {
    String,
    Date,
    Number,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameterSpec {
    pub key: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDefinition {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub statement: String,
    pub parameters: Vec<QueryParameterSpec>,
    pub default_sheet_name: Option<String>,
    pub default_table_name: Option<String>,
}

impl QueryDefinition {
    pub fn declares(&self, key: &str) -> bool {
        self.parameters.iter().any(|spec| spec.key == key)
    }
}

/// Parameter values keyed by parameter name. Absent keys stay absent;
/// there is no defaulting anywhere in the merge path.
pub type QueryParameterValues = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeMode {
    Global,
    Unique,
}

impl MergeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Unique => "unique",
        }
    }
}

impl Default for MergeMode {
    fn default() -> Self {
        Self::Global
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    Overwrite,
    Append,
}

impl WriteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overwrite => "overwrite",
            Self::Append => "append",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetTarget {
    pub sheet_name: String,
    pub table_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfigurationItem {
    pub id: String,
    pub api_id: String,
    pub display_name: String,
    pub target_sheet_name: String,
    pub target_table_name: String,
    pub write_mode: WriteMode,
    pub include_in_batch: bool,
    pub parameters: QueryParameterValues,
}

impl QueryConfigurationItem {
    pub fn target(&self) -> SheetTarget {
        SheetTarget {
            sheet_name: self.target_sheet_name.clone(),
            table_name: self.target_table_name.clone(),
        }
    }
}

/// A named list of configured queries, persisted wholesale between
/// sessions. The queue never owns one of these; it only borrows the
/// item list for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfiguration {
    pub id: String,
    pub name: String,
    pub items: Vec<QueryConfigurationItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRunRequest {
    pub config_id: String,
    pub items: Vec<QueryConfigurationItem>,
    pub backoff_ms: Option<u64>,
    pub max_rows_per_item: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueProgress {
    pub config_id: Option<String>,
    pub total: usize,
    pub completed: usize,
    pub current_item_id: Option<String>,
}

impl QueueProgress {
    pub fn idle() -> Self {
        Self {
            config_id: None,
            total: 0,
            completed: 0,
            current_item_id: None,
        }
    }
}

impl Default for QueueProgress {
    fn default() -> Self {
        Self::idle()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub ok: bool,
    pub row_count: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerOptions {
    pub max_rows_per_item: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Closed,
}

impl StatementState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
            Self::Closed => "CLOSED",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementResult {
    pub statement_id: String,
    pub state: StatementState,
    pub total_chunk_count: Option<u32>,
    pub total_row_count: Option<u64>,
    pub columns: Option<Vec<ColumnInfo>>,
    pub data: Option<Vec<Vec<serde_json::Value>>>,
    pub chunk_index: Option<u32>,
    pub error_message: Option<String>,
}

impl StatementResult {
    pub fn failed(statement_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            statement_id: statement_id.into(),
            state: StatementState::Failed,
            total_chunk_count: None,
            total_row_count: None,
            columns: None,
            data: None,
            chunk_index: None,
            error_message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub default_merge_mode: MergeMode,
    pub batch_backoff_ms: Option<u64>,
    pub max_rows_per_item: Option<u64>,
    pub redact_telemetry: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            default_merge_mode: MergeMode::Global,
            batch_backoff_ms: None,
            max_rows_per_item: None,
            redact_telemetry: true,
        }
    }
}
