//! CompletionOptions and the three-layer OptionsMerger (§3, §4.3).

use std::collections::HashMap;

use serde_json::Value;

use super::capabilities::Capabilities;
use super::error::EngineError;
use super::mcp_catalog::ToolSpec;

/// `response_format`: either a typed record or `{type, json_schema?}`. When a
/// JSON Schema is supplied, `schema` is validated eagerly at merge time.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<Value>,
}

/// LLM tool-choice directive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoiceMode {
    #[default]
    Auto,
    None,
    Required,
}

/// A settable bag of LLM knobs. Every numeric/bool field is `Option` so that
/// "unset" is distinguishable from "explicit zero/false" across the three
/// merge layers.
#[derive(Clone, Debug, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub max_completion_tokens: Option<i64>,
    pub top_p: Option<f64>,
    pub n: Option<i64>,
    pub stop: Option<Vec<String>>,
    pub presence_penalty: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub logit_bias: Option<HashMap<String, f64>>,
    pub user: Option<String>,
    pub response_format: Option<ResponseFormat>,
    pub seed: Option<i64>,
    pub tools: Option<Vec<ToolSpec>>,
    pub tool_choice: Option<ToolChoiceMode>,
    pub stream: Option<bool>,
    pub route: Option<String>,
    pub metadata: Option<HashMap<String, Value>>,
    pub uses: Option<HashMap<String, Value>>,
    pub capabilities: Option<Capabilities>,
}

macro_rules! layer_scalar {
    ($base:expr, $layer:expr, $field:ident) => {
        if $layer.$field.is_some() {
            $base.$field = $layer.$field.clone();
        }
    };
}

impl CompletionOptions {
    /// Overlays `other`'s explicitly-set fields onto `self`, metadata merged
    /// key-wise with `other`'s values winning on conflict.
    fn overlay(&mut self, other: &CompletionOptions) {
        layer_scalar!(self, other, temperature);
        layer_scalar!(self, other, max_tokens);
        layer_scalar!(self, other, max_completion_tokens);
        layer_scalar!(self, other, top_p);
        layer_scalar!(self, other, n);
        layer_scalar!(self, other, stop);
        layer_scalar!(self, other, presence_penalty);
        layer_scalar!(self, other, frequency_penalty);
        layer_scalar!(self, other, logit_bias);
        layer_scalar!(self, other, user);
        layer_scalar!(self, other, response_format);
        layer_scalar!(self, other, seed);
        layer_scalar!(self, other, tools);
        layer_scalar!(self, other, tool_choice);
        layer_scalar!(self, other, stream);
        layer_scalar!(self, other, route);
        layer_scalar!(self, other, capabilities);

        match (&mut self.metadata, &other.metadata) {
            (Some(base), Some(incoming)) => {
                for (k, v) in incoming {
                    base.insert(k.clone(), v.clone());
                }
            }
            (None, Some(incoming)) => self.metadata = Some(incoming.clone()),
            _ => {}
        }
        layer_scalar!(self, other, uses);
    }
}

/// Merges assistant-config, context, and create-hook-response option layers,
/// lowest first; each layer applies only the fields it explicitly sets.
pub struct OptionsMerger;

impl OptionsMerger {
    pub fn merge(
        assistant: &CompletionOptions,
        context: &CompletionOptions,
        hook: Option<&CompletionOptions>,
    ) -> Result<CompletionOptions, EngineError> {
        let mut merged = assistant.clone();
        merged.overlay(context);
        if let Some(hook) = hook {
            merged.overlay(hook);
        }
        if let Some(rf) = &merged.response_format {
            if let Some(schema) = &rf.json_schema {
                validate_json_schema(schema)?;
            }
        }
        Ok(merged)
    }
}

/// Eager, shallow validation: a JSON Schema document must be a JSON object
/// and, when it declares `"type"`, the value must be a known JSON Schema
/// primitive name.
fn validate_json_schema(schema: &Value) -> Result<(), EngineError> {
    let obj = schema
        .as_object()
        .ok_or_else(|| EngineError::InvalidSchema("schema must be a JSON object".into()))?;
    if let Some(t) = obj.get("type") {
        let known = ["object", "array", "string", "number", "integer", "boolean", "null"];
        let valid = match t {
            Value::String(s) => known.contains(&s.as_str()),
            Value::Array(arr) => arr.iter().all(|v| {
                v.as_str().map(|s| known.contains(&s)).unwrap_or(false)
            }),
            _ => false,
        };
        if !valid {
            return Err(EngineError::InvalidSchema(format!(
                "unknown schema type: {}",
                t
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: hook sets temperature; result wins regardless of lower layers.
    #[test]
    fn hook_temperature_wins_over_all_layers() {
        let assistant = CompletionOptions {
            temperature: Some(0.2),
            ..Default::default()
        };
        let context = CompletionOptions {
            temperature: Some(0.5),
            ..Default::default()
        };
        let hook = CompletionOptions {
            temperature: Some(0.9),
            ..Default::default()
        };
        let merged = OptionsMerger::merge(&assistant, &context, Some(&hook)).unwrap();
        assert_eq!(merged.temperature, Some(0.9));
    }

    /// **Scenario**: hook does not set temperature; context wins over assistant.
    #[test]
    fn context_wins_when_hook_unset() {
        let assistant = CompletionOptions {
            temperature: Some(0.2),
            ..Default::default()
        };
        let context = CompletionOptions {
            temperature: Some(0.5),
            ..Default::default()
        };
        let hook = CompletionOptions::default();
        let merged = OptionsMerger::merge(&assistant, &context, Some(&hook)).unwrap();
        assert_eq!(merged.temperature, Some(0.5));
    }

    #[test]
    fn metadata_merges_key_wise_hook_wins() {
        let mut assistant_meta = HashMap::new();
        assistant_meta.insert("a".to_string(), Value::from(1));
        assistant_meta.insert("shared".to_string(), Value::from("assistant"));
        let assistant = CompletionOptions {
            metadata: Some(assistant_meta),
            ..Default::default()
        };
        let mut hook_meta = HashMap::new();
        hook_meta.insert("shared".to_string(), Value::from("hook"));
        let hook = CompletionOptions {
            metadata: Some(hook_meta),
            ..Default::default()
        };
        let merged =
            OptionsMerger::merge(&assistant, &CompletionOptions::default(), Some(&hook)).unwrap();
        let metadata = merged.metadata.unwrap();
        assert_eq!(metadata["shared"], Value::from("hook"));
        assert_eq!(metadata["a"], Value::from(1));
    }

    #[test]
    fn invalid_schema_type_fails_merge() {
        let hook = CompletionOptions {
            response_format: Some(ResponseFormat {
                kind: "json_schema".into(),
                json_schema: Some(serde_json::json!({"type": "not-a-type"})),
            }),
            ..Default::default()
        };
        let err = OptionsMerger::merge(
            &CompletionOptions::default(),
            &CompletionOptions::default(),
            Some(&hook),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSchema(_)));
    }

    #[test]
    fn valid_schema_passes_merge() {
        let hook = CompletionOptions {
            response_format: Some(ResponseFormat {
                kind: "json_schema".into(),
                json_schema: Some(serde_json::json!({"type": "object"})),
            }),
            ..Default::default()
        };
        assert!(OptionsMerger::merge(
            &CompletionOptions::default(),
            &CompletionOptions::default(),
            Some(&hook)
        )
        .is_ok());
    }
}
