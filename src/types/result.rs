//! Enrichment Result Types
//!
//! Structured values returned by the completion client, plus the
//! per-node envelope that records how the value was obtained.
//!
//! Field names follow the JSON keys the models are asked to produce
//! (`Description`, `Technologies`, ...). Deserialization is the schema
//! check: a missing required key fails, while scalar/list shape drift
//! (a numeric rating, a list-valued description) is coerced to text.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

// =============================================================================
// Schema Trait
// =============================================================================

/// A result type with a JSON schema and a documented empty instance
pub trait ResultSchema:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    /// JSON schema sent to the provider alongside the instruction
    fn schema() -> Value;

    /// Validate a provider response against this schema
    fn from_response(content: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(content)
    }
}

// =============================================================================
// Module / File Results
// =============================================================================

/// Generic summary for a folder or a root-level file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModuleResult {
    #[serde(deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(deserialize_with = "lenient_list")]
    pub technologies: Vec<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub rating: String,
}

impl ResultSchema for ModuleResult {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "Description": {"type": "string", "description": "What this module does"},
                "Technologies": {"type": "array", "items": {"type": "string"}},
                "Rating": {"type": "string", "description": "Relevance of this module for the README, 1 to 10"}
            },
            "required": ["Description", "Technologies", "Rating"]
        })
    }
}

/// Summary of one file's content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileResult {
    #[serde(deserialize_with = "lenient_text")]
    pub readme_section: String,
    #[serde(deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(deserialize_with = "lenient_text")]
    pub code_extractions: String,
    #[serde(deserialize_with = "lenient_list")]
    pub technologies: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub rating: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functions: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
}

impl ResultSchema for FileResult {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "ReadmeSection": {"type": "string", "description": "README section this file belongs to, or None"},
                "Description": {"type": "string"},
                "CodeExtractions": {"type": "string", "description": "Short snippet of the code, configuration or task"},
                "Technologies": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["ReadmeSection", "Description", "CodeExtractions", "Technologies"]
        })
    }
}

// =============================================================================
// Structural Results
// =============================================================================

/// Syntactic category of a source unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralCategory {
    Functions,
    Classes,
    TopLevel,
}

impl StructuralCategory {
    pub const ALL: [StructuralCategory; 3] = [Self::Functions, Self::Classes, Self::TopLevel];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Functions => "functions",
            Self::Classes => "classes",
            Self::TopLevel => "top_level",
        }
    }
}

impl std::fmt::Display for StructuralCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one structural category of a source unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StructuralResult {
    #[serde(deserialize_with = "lenient_text")]
    pub description: String,
    pub code_extractions: Value,
}

impl ResultSchema for StructuralResult {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "Description": {"type": "string"},
                "CodeExtractions": {
                    "description": "Key code segments with comments",
                    "anyOf": [{"type": "string"}, {"type": "object"}, {"type": "array"}]
                }
            },
            "required": ["Description", "CodeExtractions"]
        })
    }
}

// =============================================================================
// Node Envelope
// =============================================================================

/// How a node's result was obtained
///
/// A node holds exactly one of these once its task has run; the value is
/// replaced whole, never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeEnrichment<T> {
    Enriched { result: T },
    Fallback { result: T, reason: String },
    NotApplicable { reason: String },
}

impl<T> NodeEnrichment<T> {
    pub fn enriched(result: T) -> Self {
        Self::Enriched { result }
    }

    pub fn fallback(result: T, reason: impl Into<String>) -> Self {
        Self::Fallback {
            result,
            reason: reason.into(),
        }
    }

    pub fn not_applicable(reason: impl Into<String>) -> Self {
        Self::NotApplicable {
            reason: reason.into(),
        }
    }

    pub fn result(&self) -> Option<&T> {
        match self {
            Self::Enriched { result } | Self::Fallback { result, .. } => Some(result),
            Self::NotApplicable { .. } => None,
        }
    }

    pub fn is_enriched(&self) -> bool {
        matches!(self, Self::Enriched { .. })
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Enriched { .. } => "enriched",
            Self::Fallback { .. } => "fallback",
            Self::NotApplicable { .. } => "not_applicable",
        }
    }
}

/// Content summary of a folder node: one result per processed file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub files: BTreeMap<String, FileResult>,
    /// Supported files beyond the per-node cap, in listed order
    #[serde(default)]
    pub dropped_files: Vec<String>,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub unsupported_files: Vec<String>,
}

// =============================================================================
// Lenient Field Decoding
// =============================================================================

pub(crate) fn value_to_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .map(value_to_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Value::deserialize(deserializer).map(value_to_text)
}

fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .into_iter()
            .map(value_to_text)
            .filter(|s| !s.is_empty())
            .collect(),
        other => {
            let text = value_to_text(other);
            if text.is_empty() { Vec::new() } else { vec![text] }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_result_accepts_numeric_rating() {
        let value = json!({
            "Description": "Entry point",
            "Technologies": ["Python"],
            "Rating": 8
        });
        let result = ModuleResult::from_response(value).unwrap();
        assert_eq!(result.rating, "8");
        assert_eq!(result.technologies, vec!["Python"]);
    }

    #[test]
    fn test_missing_required_field_fails_validation() {
        let value = json!({"Description": "no technologies", "Rating": "3"});
        assert!(ModuleResult::from_response(value).is_err());
    }

    #[test]
    fn test_file_result_null_readme_section() {
        let value = json!({
            "ReadmeSection": null,
            "Description": "Config loader",
            "CodeExtractions": ["a = 1", "b = 2"],
            "Technologies": "TOML"
        });
        let result = FileResult::from_response(value).unwrap();
        assert_eq!(result.readme_section, "");
        assert_eq!(result.code_extractions, "a = 1\nb = 2");
        assert_eq!(result.technologies, vec!["TOML"]);
        assert!(result.classes.is_none());
    }

    #[test]
    fn test_structural_result_keeps_code_extractions_shape() {
        let value = json!({
            "Description": ["load", "save"],
            "CodeExtractions": {"load": "def load(path): ..."}
        });
        let result = StructuralResult::from_response(value).unwrap();
        assert_eq!(result.description, "load\nsave");
        assert!(result.code_extractions.is_object());
    }

    #[test]
    fn test_node_enrichment_tagging() {
        let node = NodeEnrichment::<ModuleResult>::not_applicable("project root");
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["status"], "not_applicable");
        assert_eq!(value["reason"], "project root");
        assert!(node.result().is_none());

        let node = NodeEnrichment::fallback(ModuleResult::default(), "retries exhausted");
        let back: NodeEnrichment<ModuleResult> =
            serde_json::from_value(serde_json::to_value(&node).unwrap()).unwrap();
        assert!(back.is_fallback());
        assert_eq!(back.result(), Some(&ModuleResult::default()));
    }
}
