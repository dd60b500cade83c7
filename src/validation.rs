use crate::models::{ParamType, QueryDefinition, QueryParameterValues};
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct ParameterValidation {
    pub error: Option<String>,
    pub errors: Vec<String>,
}

impl ParameterValidation {
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.errors.is_empty()
    }

    fn ok() -> Self {
        Self {
            error: None,
            errors: Vec::new(),
        }
    }
}

/// Derives a JSON schema from a definition's declared parameter list.
/// Values always travel as strings; date and number parameters get a
/// shape pattern on top.
pub fn parameter_schema(definition: &QueryDefinition) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for spec in &definition.parameters {
        let property = match spec.param_type {
            ParamType::String => json!({ "type": "string" }),
            ParamType::Date => json!({ "type": "string", "pattern": r"^\d{4}-\d{2}-\d{2}$" }),
            ParamType::Number => json!({ "type": "string", "pattern": r"^-?\d+(\.\d+)?$" }),
        };
        properties.insert(spec.key.clone(), property);
        if spec.required {
            required.push(Value::String(spec.key.clone()));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

pub fn validate_parameters(
    definition: &QueryDefinition,
    values: &QueryParameterValues,
) -> ParameterValidation {
    let schema = parameter_schema(definition);
    let compiled = match jsonschema::JSONSchema::compile(&schema) {
        Ok(compiled) => compiled,
        Err(error) => {
            return ParameterValidation {
                error: Some(format!("Failed to compile parameter schema: {}", error)),
                errors: vec![],
            }
        }
    };

    let payload = match serde_json::to_value(values) {
        Ok(payload) => payload,
        Err(error) => {
            return ParameterValidation {
                error: Some(format!("Parameter map is not valid JSON: {}", error)),
                errors: vec![],
            }
        }
    };

    let errors: Vec<String> = compiled
        .validate(&payload)
        .err()
        .map(|errors| {
            errors
                .map(|error| {
                    let path = error.instance_path.to_string();
                    if path.is_empty() {
                        error.to_string()
                    } else {
                        format!("{}: {}", path, error)
                    }
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if errors.is_empty() {
        ParameterValidation::ok()
    } else {
        ParameterValidation {
            error: Some(format!(
                "Parameters for {} did not match the declared schema.",
                definition.id
            )),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::validate_parameters;
    use crate::catalog::QueryCatalog;
    use std::collections::BTreeMap;

    #[test]
    fn accepts_complete_parameters() {
        let catalog = QueryCatalog::builtin();
        let definition = catalog.get_api_by_id("revenue-by-group").expect("definition");

        let mut values = BTreeMap::new();
        values.insert("StartDate".to_string(), "2024-01-01".to_string());
        values.insert("EndDate".to_string(), "2024-03-31".to_string());
        values.insert("Group".to_string(), "Consumer".to_string());

        assert!(validate_parameters(definition, &values).is_ok());
    }

    #[test]
    fn reports_missing_required_key() {
        let catalog = QueryCatalog::builtin();
        let definition = catalog.get_api_by_id("revenue-by-group").expect("definition");

        let mut values = BTreeMap::new();
        values.insert("StartDate".to_string(), "2024-01-01".to_string());

        let validation = validate_parameters(definition, &values);
        assert!(!validation.is_ok());
        assert!(validation.errors.iter().any(|error| error.contains("EndDate")));
    }

    #[test]
    fn rejects_malformed_date() {
        let catalog = QueryCatalog::builtin();
        let definition = catalog.get_api_by_id("sales-summary").expect("definition");

        let mut values = BTreeMap::new();
        values.insert("StartDate".to_string(), "January 1".to_string());
        values.insert("EndDate".to_string(), "2024-03-31".to_string());

        let validation = validate_parameters(definition, &values);
        assert!(!validation.is_ok());
    }

    #[test]
    fn rejects_undeclared_keys() {
        let catalog = QueryCatalog::builtin();
        let definition = catalog.get_api_by_id("headcount-trend").expect("definition");

        let mut values = BTreeMap::new();
        values.insert("Group".to_string(), "All".to_string());
        values.insert("Unknown".to_string(), "x".to_string());

        let validation = validate_parameters(definition, &values);
        assert!(!validation.is_ok());
    }
}
