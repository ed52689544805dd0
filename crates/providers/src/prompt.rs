//! Prompt construction and response parsing shared by all HTTP providers.

use chartgen_core::chart::{ChartSuggestion, ChartValidation, GenerationArtifact, SchemaContext};
use serde_json::Value;

use crate::provider::ProviderError;

/// Chart types the model is allowed to choose from.
pub const SUPPORTED_CHART_TYPES: &[&str] = &[
    "bar", "line", "pie", "area", "scatter", "heatmap", "funnel", "treemap",
];

/// Sampling temperature for chart generation.
pub const GENERATE_TEMPERATURE: f64 = 0.3;
/// Sampling temperature for chart type suggestions.
pub const SUGGEST_TEMPERATURE: f64 = 0.2;
/// Sampling temperature for chart validation.
pub const VALIDATE_TEMPERATURE: f64 = 0.1;

// ---------------------------------------------------------------------------
// Prompt builders
// ---------------------------------------------------------------------------

/// System prompt describing the available schema and the expected JSON reply.
pub fn build_system_prompt(context: &SchemaContext) -> String {
    let mut tables_info = String::new();
    for table in context.tables() {
        tables_info.push_str(&format!("\nTable: {}\n", table.name));
        for (name, data_type) in &table.columns {
            tables_info.push_str(&format!("  - {name} ({data_type})\n"));
        }
    }
    if tables_info.is_empty() {
        tables_info.push_str("\n(no tables provided)\n");
    }

    format!(
        "You are a data visualization expert. Convert natural language requests into chart configurations.\n\
         \n\
         Available database schema:\n\
         {tables_info}\n\
         Return JSON with:\n\
         - chart_type: {}\n\
         - title: descriptive title\n\
         - sql_query: SQL query using available tables\n\
         - chart_config: complete chart configuration\n\
         - confidence: 0-1 confidence score\n\
         - reasoning: explanation of choices made\n\
         \n\
         Consider data types, relationships, and best visualization practices.",
        SUPPORTED_CHART_TYPES.join(", ")
    )
}

pub fn build_suggest_prompt(description: &str) -> String {
    format!(
        "Based on this data description: \"{description}\"\n\
         \n\
         Suggest the top 3 most appropriate chart types with confidence scores.\n\
         Return a JSON object {{\"suggestions\": [...]}} where each item has: \
         chart_type, confidence (0-1), reasoning, basic_config"
    )
}

pub fn build_validate_prompt(chart_config: &Value, original_prompt: &str) -> String {
    let pretty = serde_json::to_string_pretty(chart_config).unwrap_or_else(|_| chart_config.to_string());
    format!(
        "Validate if this chart configuration correctly represents the user's intent:\n\
         \n\
         Original prompt: \"{original_prompt}\"\n\
         Chart config: {pretty}\n\
         \n\
         Return JSON with: is_valid (boolean), issues (array), suggestions (array)"
    )
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Parse model output text as JSON, tolerating a surrounding Markdown fence.
pub fn parse_json_content(content: &str) -> Result<Value, ProviderError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(unfenced)
        .map_err(|e| ProviderError::MalformedResponse(format!("content is not valid JSON: {e}")))
}

pub fn parse_artifact(content: &str) -> Result<GenerationArtifact, ProviderError> {
    let value = parse_json_content(content)?;
    serde_json::from_value(value)
        .map_err(|e| ProviderError::MalformedResponse(format!("unexpected chart shape: {e}")))
}

/// Accepts either `{"suggestions": [...]}` or a bare array.
pub fn parse_suggestions(content: &str) -> Result<Vec<ChartSuggestion>, ProviderError> {
    let value = parse_json_content(content)?;
    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut obj) => obj.remove("suggestions").unwrap_or(Value::Array(Vec::new())),
        other => {
            return Err(ProviderError::MalformedResponse(format!(
                "expected suggestions, got {other}"
            )))
        }
    };
    serde_json::from_value(list)
        .map_err(|e| ProviderError::MalformedResponse(format!("unexpected suggestion shape: {e}")))
}

pub fn parse_validation(content: &str) -> Result<ChartValidation, ProviderError> {
    let value = parse_json_content(content)?;
    serde_json::from_value(value)
        .map_err(|e| ProviderError::MalformedResponse(format!("unexpected validation shape: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn system_prompt_lists_tables_and_columns() {
        let ctx = SchemaContext::new(json!({
            "tables": [{ "name": "orders", "columns": [{ "name": "total", "type": "numeric" }] }]
        }));
        let prompt = build_system_prompt(&ctx);
        assert!(prompt.contains("Table: orders"));
        assert!(prompt.contains("  - total (numeric)"));
        assert!(prompt.contains("heatmap"));
    }

    #[test]
    fn system_prompt_marks_empty_schema() {
        let prompt = build_system_prompt(&SchemaContext::empty());
        assert!(prompt.contains("(no tables provided)"));
    }

    #[test]
    fn parse_artifact_from_fenced_json() {
        let content = "```json\n{\"chart_type\":\"pie\",\"chart_config\":{},\"confidence\":0.7}\n```";
        let artifact = parse_artifact(content).unwrap();
        assert_eq!(artifact.chart_type, "pie");
        assert_eq!(artifact.confidence, 0.7);
    }

    #[test]
    fn parse_artifact_rejects_prose() {
        assert_matches!(
            parse_artifact("Sure! Here is your chart."),
            Err(ProviderError::MalformedResponse(_))
        );
    }

    #[test]
    fn parse_artifact_rejects_missing_config() {
        assert_matches!(
            parse_artifact(r#"{"chart_type":"bar"}"#),
            Err(ProviderError::MalformedResponse(_))
        );
    }

    #[test]
    fn parse_suggestions_accepts_wrapped_and_bare() {
        let wrapped = r#"{"suggestions":[{"chart_type":"bar","confidence":0.9}]}"#;
        let bare = r#"[{"chart_type":"line","confidence":0.4}]"#;
        assert_eq!(parse_suggestions(wrapped).unwrap()[0].chart_type, "bar");
        assert_eq!(parse_suggestions(bare).unwrap()[0].chart_type, "line");
        assert!(parse_suggestions("{}").unwrap().is_empty());
    }

    #[test]
    fn parse_validation_defaults_lists() {
        let v = parse_validation(r#"{"is_valid":false}"#).unwrap();
        assert!(!v.is_valid);
        assert!(v.issues.is_empty());
    }
}
