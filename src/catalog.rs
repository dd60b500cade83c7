use crate::models::QueryDefinition;

const BUILTIN_CATALOG_JSON: &str = include_str!("catalog.json");

/// Read-only lookup of the query definitions a session can run.
/// Definitions are immutable for the lifetime of the catalog.
#[derive(Debug)]
pub struct QueryCatalog {
    apis: Vec<QueryDefinition>,
}

impl QueryCatalog {
    pub fn builtin() -> Self {
        let apis: Vec<QueryDefinition> =
            serde_json::from_str(BUILTIN_CATALOG_JSON).expect("built-in catalog is valid JSON");
        Self { apis }
    }

    pub fn from_definitions(apis: Vec<QueryDefinition>) -> Self {
        Self { apis }
    }

    pub fn get_apis(&self) -> &[QueryDefinition] {
        &self.apis
    }

    pub fn get_api_by_id(&self, id: &str) -> Option<&QueryDefinition> {
        self.apis.iter().find(|api| api.id == id)
    }
}
