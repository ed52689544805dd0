//! Chart generation payload types shared by providers and the batch engine.
//!
//! [`SchemaContext`] is treated as opaque by the engine: it is handed to
//! every provider exactly as the caller supplied it. The only structure the
//! engine relies on is checked by [`SchemaContext::validate`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Schema context
// ---------------------------------------------------------------------------

/// Description of the tables and columns a generated chart may query.
///
/// Expected shape:
///
/// ```json
/// { "tables": [ { "name": "orders", "columns": [ { "name": "total", "type": "numeric" } ] } ] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaContext(Value);

/// A table entry extracted from a [`SchemaContext`] for prompt building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub name: String,
    /// `(column name, column type)` pairs; missing types render as `unknown`.
    pub columns: Vec<(String, String)>,
}

impl SchemaContext {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// A context with no tables.
    pub fn empty() -> Self {
        Self(serde_json::json!({ "tables": [] }))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Check the structural requirements of the context.
    ///
    /// The context must be a JSON object. If it has a `tables` member, that
    /// member must be an array of objects, each carrying a string `name`.
    pub fn validate(&self) -> Result<(), CoreError> {
        let obj = self.0.as_object().ok_or_else(|| {
            CoreError::Validation("Schema context must be a JSON object".to_string())
        })?;

        let Some(tables) = obj.get("tables") else {
            return Ok(());
        };

        let tables = tables.as_array().ok_or_else(|| {
            CoreError::Validation("Schema context 'tables' must be an array".to_string())
        })?;

        for (i, table) in tables.iter().enumerate() {
            let name = table.get("name").and_then(Value::as_str);
            if name.map_or(true, |n| n.trim().is_empty()) {
                return Err(CoreError::Validation(format!(
                    "Schema context table at index {i} must have a non-empty 'name'"
                )));
            }
        }
        Ok(())
    }

    /// Tables listed in the context. Malformed entries are skipped.
    pub fn tables(&self) -> Vec<TableDescription> {
        let Some(tables) = self.0.get("tables").and_then(Value::as_array) else {
            return Vec::new();
        };

        tables
            .iter()
            .filter_map(|table| {
                let name = table.get("name")?.as_str()?.to_string();
                let columns = table
                    .get("columns")
                    .and_then(Value::as_array)
                    .map(|cols| {
                        cols.iter()
                            .filter_map(|c| {
                                let col_name = c.get("name")?.as_str()?.to_string();
                                let col_type = c
                                    .get("type")
                                    .and_then(Value::as_str)
                                    .unwrap_or("unknown")
                                    .to_string();
                                Some((col_name, col_type))
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Some(TableDescription { name, columns })
            })
            .collect()
    }
}

impl Default for SchemaContext {
    fn default() -> Self {
        Self::empty()
    }
}

// ---------------------------------------------------------------------------
// Generated artifact
// ---------------------------------------------------------------------------

/// Chart configuration produced by a generation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationArtifact {
    pub chart_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sql_query: String,
    pub chart_config: Value,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// A candidate chart type proposed for a data description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSuggestion {
    pub chart_type: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, alias = "basic_config")]
    pub config: Value,
}

/// Verdict on whether a chart configuration matches the prompt's intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartValidation {
    pub is_valid: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ChartValidation {
    /// A passing verdict with no findings.
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            issues: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    // -- validate -------------------------------------------------------------

    #[test]
    fn empty_context_is_valid() {
        assert!(SchemaContext::empty().validate().is_ok());
    }

    #[test]
    fn object_without_tables_is_valid() {
        assert!(SchemaContext::new(json!({ "dialect": "postgres" }))
            .validate()
            .is_ok());
    }

    #[test]
    fn non_object_context_rejected() {
        let result = SchemaContext::new(json!(["orders"])).validate();
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn tables_must_be_array() {
        let result = SchemaContext::new(json!({ "tables": "orders" })).validate();
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn table_without_name_rejected() {
        let result =
            SchemaContext::new(json!({ "tables": [{ "name": "a" }, { "columns": [] }] }))
                .validate();
        assert_matches!(result, Err(CoreError::Validation(msg)) if msg.contains("index 1"));
    }

    // -- tables ---------------------------------------------------------------

    #[test]
    fn tables_extracts_columns_with_unknown_type_default() {
        let ctx = SchemaContext::new(json!({
            "tables": [{
                "name": "orders",
                "columns": [{ "name": "total", "type": "numeric" }, { "name": "note" }]
            }]
        }));
        let tables = ctx.tables();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "orders");
        assert_eq!(
            tables[0].columns,
            vec![
                ("total".to_string(), "numeric".to_string()),
                ("note".to_string(), "unknown".to_string()),
            ]
        );
    }

    #[test]
    fn context_serializes_transparently() {
        let raw = json!({ "tables": [], "extra": 1 });
        let ctx = SchemaContext::new(raw.clone());
        assert_eq!(serde_json::to_value(&ctx).unwrap(), raw);
    }

    // -- artifact -------------------------------------------------------------

    #[test]
    fn artifact_defaults_optional_fields() {
        let artifact: GenerationArtifact = serde_json::from_value(json!({
            "chart_type": "bar",
            "chart_config": { "x": "region" }
        }))
        .unwrap();
        assert_eq!(artifact.chart_type, "bar");
        assert!(artifact.title.is_empty());
        assert_eq!(artifact.confidence, 0.0);
    }

    #[test]
    fn suggestion_accepts_basic_config_alias() {
        let s: ChartSuggestion = serde_json::from_value(json!({
            "chart_type": "line",
            "confidence": 0.8,
            "basic_config": { "smooth": true }
        }))
        .unwrap();
        assert_eq!(s.config["smooth"], true);
    }
}
