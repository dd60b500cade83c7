use crate::errors::CoreResult;
use crate::models::{ColumnInfo, SheetTarget, WriteMode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Destination for result rows. The production implementation lives in
/// the host client and writes into spreadsheet tables; the core only
/// cares that rows land under a target with the requested write mode.
pub trait RowSink: Send + Sync {
    fn write_rows(
        &self,
        target: &SheetTarget,
        write_mode: WriteMode,
        columns: &[ColumnInfo],
        rows: &[Vec<Value>],
    ) -> CoreResult<u64>;
}

#[derive(Debug, Clone, Default)]
pub struct TableContents {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<Value>>,
}

/// Keeps written tables in memory, keyed by sheet and table name.
#[derive(Default)]
pub struct MemoryRowSink {
    tables: Mutex<HashMap<SheetTarget, TableContents>>,
}

impl MemoryRowSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, target: &SheetTarget) -> Option<TableContents> {
        let tables = self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        tables.get(target).cloned()
    }
}

impl RowSink for MemoryRowSink {
    fn write_rows(
        &self,
        target: &SheetTarget,
        write_mode: WriteMode,
        columns: &[ColumnInfo],
        rows: &[Vec<Value>],
    ) -> CoreResult<u64> {
        let mut tables = self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let table = tables.entry(target.clone()).or_default();

        match write_mode {
            WriteMode::Overwrite => {
                table.columns = columns.to_vec();
                table.rows = rows.to_vec();
            }
            WriteMode::Append => {
                if table.columns.is_empty() {
                    table.columns = columns.to_vec();
                }
                table.rows.extend(rows.iter().cloned());
            }
        }

        Ok(rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryRowSink, RowSink};
    use crate::models::{ColumnInfo, SheetTarget, WriteMode};
    use serde_json::json;

    fn target() -> SheetTarget {
        SheetTarget {
            sheet_name: "Sales".to_string(),
            table_name: "SalesSummary".to_string(),
        }
    }

    fn columns() -> Vec<ColumnInfo> {
        vec![ColumnInfo {
            name: "total".to_string(),
            type_name: "DOUBLE".to_string(),
        }]
    }

    #[test]
    fn overwrite_replaces_existing_rows() {
        let sink = MemoryRowSink::new();
        sink.write_rows(&target(), WriteMode::Overwrite, &columns(), &[vec![json!(1)]])
            .expect("write");
        sink.write_rows(&target(), WriteMode::Overwrite, &columns(), &[vec![json!(2)]])
            .expect("write");

        let table = sink.table(&target()).expect("table");
        assert_eq!(table.rows, vec![vec![json!(2)]]);
    }

    #[test]
    fn append_accumulates_rows() {
        let sink = MemoryRowSink::new();
        sink.write_rows(&target(), WriteMode::Append, &columns(), &[vec![json!(1)]])
            .expect("write");
        sink.write_rows(&target(), WriteMode::Append, &columns(), &[vec![json!(2)]])
            .expect("write");

        let table = sink.table(&target()).expect("table");
        assert_eq!(table.rows, vec![vec![json!(1)], vec![json!(2)]]);
    }
}
