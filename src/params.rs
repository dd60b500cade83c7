use crate::models::{MergeMode, QueryDefinition, QueryParameterValues};
use crate::storage::Storage;
use std::collections::BTreeMap;

const GLOBAL_PARAMS_KEY: &str = "queryParams:global";
const RUN_FLAGS_KEY: &str = "queryParams:runFlags";

fn query_params_key(query_id: &str) -> String {
    format!("queryParams:query:{}", query_id)
}

/// Holds the global parameter map and per-query override maps, and
/// resolves the effective parameter set for a definition under a merge
/// mode. Reads always succeed with best-effort defaults; writes replace
/// the stored map wholesale and never surface storage failures.
#[derive(Clone)]
pub struct ParameterStore {
    storage: Storage,
}

impl ParameterStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn global_params(&self) -> QueryParameterValues {
        self.storage.get_item(GLOBAL_PARAMS_KEY, QueryParameterValues::new())
    }

    pub fn set_global_params(&self, values: QueryParameterValues) {
        self.storage.set_item(GLOBAL_PARAMS_KEY, &values);
    }

    pub fn query_params(&self, query_id: &str) -> Option<QueryParameterValues> {
        self.storage.get_optional(&query_params_key(query_id))
    }

    pub fn set_query_params(&self, query_id: &str, values: QueryParameterValues) {
        self.storage.set_item(&query_params_key(query_id), &values);
    }

    pub fn query_run_flag(&self, query_id: &str) -> bool {
        let flags: BTreeMap<String, bool> = self.storage.get_item(RUN_FLAGS_KEY, BTreeMap::new());
        flags.get(query_id).copied().unwrap_or(false)
    }

    pub fn set_query_run_flag(&self, query_id: &str, include: bool) {
        let mut flags: BTreeMap<String, bool> = self.storage.get_item(RUN_FLAGS_KEY, BTreeMap::new());
        flags.insert(query_id.to_string(), include);
        self.storage.set_item(RUN_FLAGS_KEY, &flags);
    }

    /// Resolves the parameter map a run of `definition` should see.
    ///
    /// `global` mode uses the global map alone; `unique` mode shallow-
    /// merges the per-query override over it, override values winning
    /// key by key. Both modes restrict the result to the keys the
    /// definition declares; keys with no value stay absent.
    pub fn effective_params(
        &self,
        definition: &QueryDefinition,
        mode: MergeMode,
    ) -> QueryParameterValues {
        let mut merged = self.global_params();
        if mode == MergeMode::Unique {
            if let Some(overrides) = self.query_params(&definition.id) {
                for (key, value) in overrides {
                    merged.insert(key, value);
                }
            }
        }
        merged
            .into_iter()
            .filter(|(key, _)| definition.declares(key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::ParameterStore;
    use crate::models::{MergeMode, ParamType, QueryDefinition, QueryParameterSpec};
    use crate::storage::memory::MemoryStore;
    use crate::storage::Storage;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn definition(keys: &[&str]) -> QueryDefinition {
        QueryDefinition {
            id: "fixture".to_string(),
            name: "Fixture".to_string(),
            description: None,
            statement: "SELECT 1".to_string(),
            parameters: keys
                .iter()
                .map(|key| QueryParameterSpec {
                    key: key.to_string(),
                    param_type: ParamType::String,
                    required: false,
                })
                .collect(),
            default_sheet_name: None,
            default_table_name: None,
        }
    }

    fn store() -> ParameterStore {
        ParameterStore::new(Storage::new(Arc::new(MemoryStore::new())))
    }

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn global_mode_filters_to_declared_keys() {
        let store = store();
        store.set_global_params(map(&[("StartDate", "2024-01-01"), ("Group", "All")]));

        let effective = store.effective_params(
            &definition(&["StartDate", "Group", "SubGroup"]),
            MergeMode::Global,
        );
        assert_eq!(effective, map(&[("StartDate", "2024-01-01"), ("Group", "All")]));
        assert!(!effective.contains_key("SubGroup"));
    }

    #[test]
    fn unique_mode_overrides_win_key_by_key() {
        let store = store();
        store.set_global_params(map(&[("StartDate", "2024-01-01"), ("Group", "All")]));
        store.set_query_params("fixture", map(&[("Group", "Consumer"), ("SubGroup", "North")]));

        let effective = store.effective_params(
            &definition(&["StartDate", "Group", "SubGroup"]),
            MergeMode::Unique,
        );
        assert_eq!(
            effective,
            map(&[
                ("StartDate", "2024-01-01"),
                ("Group", "Consumer"),
                ("SubGroup", "North"),
            ])
        );
    }

    #[test]
    fn unique_mode_without_override_falls_back_to_global() {
        let store = store();
        store.set_global_params(map(&[("Group", "All")]));

        let effective = store.effective_params(&definition(&["Group"]), MergeMode::Unique);
        assert_eq!(effective, map(&[("Group", "All")]));
    }

    #[test]
    fn uninitialized_reads_return_defaults() {
        let store = store();
        assert!(store.global_params().is_empty());
        assert_eq!(store.query_params("anything"), None);
        assert!(!store.query_run_flag("anything"));
    }

    #[test]
    fn run_flags_round_trip() {
        let store = store();
        store.set_query_run_flag("sales-summary", true);
        assert!(store.query_run_flag("sales-summary"));
        store.set_query_run_flag("sales-summary", false);
        assert!(!store.query_run_flag("sales-summary"));
    }

    #[test]
    fn corrupted_global_map_reads_as_empty() {
        let backend = Arc::new(MemoryStore::new());
        backend.seed("queryParams:global", "not-json");
        let store = ParameterStore::new(Storage::new(backend));
        assert!(store.global_params().is_empty());
    }

    #[test]
    fn set_global_params_replaces_wholesale() {
        let store = store();
        store.set_global_params(map(&[("StartDate", "2024-01-01"), ("Group", "All")]));
        store.set_global_params(map(&[("Group", "Consumer")]));
        assert_eq!(store.global_params(), map(&[("Group", "Consumer")]));
    }
}
