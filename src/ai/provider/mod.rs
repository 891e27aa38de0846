//! Completion Client Abstraction
//!
//! Defines the `CompletionClient` trait: the sole boundary to the external
//! text-generation service. A client takes an instruction identifier, its
//! ordered named variables and an optional target schema, and returns
//! either a JSON value or a typed `CompletionError` (transient or size
//! limit). Clients are stateless and shared read-only across tasks.

mod openai;

#[cfg(test)]
pub mod mock;

pub use openai::{ApiFlavor, OpenAiClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::prompt::InstructionId;
use crate::types::{CompletionError, EnrichError, Result};

// =============================================================================
// Request / Response
// =============================================================================

/// One logical completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub instruction: InstructionId,
    /// Template variables, in the order they were added
    pub variables: Vec<(String, Value)>,
    pub schema: Option<Value>,
}

impl CompletionRequest {
    pub fn new(instruction: InstructionId) -> Self {
        Self {
            instruction,
            variables: Vec::new(),
            schema: None,
        }
    }

    pub fn var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.push((name.into(), value.into()));
        self
    }

    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Variables as one JSON object, the unit of budget estimation
    pub fn payload(&self) -> Value {
        Value::Object(
            self.variables
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<_, _>>(),
        )
    }

    /// Copy of this request with variable values taken from `payload`,
    /// keeping the original variable order
    pub fn with_payload(&self, payload: &Value) -> Self {
        let variables = self
            .variables
            .iter()
            .map(|(name, value)| {
                let value = payload.get(name).cloned().unwrap_or_else(|| value.clone());
                (name.clone(), value)
            })
            .collect();
        Self {
            instruction: self.instruction,
            variables,
            schema: self.schema.clone(),
        }
    }
}

/// Successful completion with usage metrics
#[derive(Debug, Clone)]
pub struct Completion {
    /// Generated content (structured JSON)
    pub content: Value,
    pub usage: TokenUsage,
    /// Cost in USD, when the provider reports it
    pub cost_usd: f64,
}

impl Completion {
    pub fn content_only(content: Value) -> Self {
        Self {
            content,
            usage: TokenUsage::default(),
            cost_usd: 0.0,
        }
    }
}

/// Token usage metrics for cost tracking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

// =============================================================================
// Client Trait
// =============================================================================

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Run one completion.
    ///
    /// The returned value is parsed JSON; conformance to `request.schema`
    /// is checked by the caller.
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<Completion, CompletionError>;

    /// Provider name for logging
    fn name(&self) -> &str;

    fn model(&self) -> &str;
}

/// Shared client for concurrent access across all tree branches
pub type SharedClient = Arc<dyn CompletionClient>;

// =============================================================================
// Provider Configuration
// =============================================================================

/// Resolved provider settings.
///
/// The API key never reaches serialized output and is redacted in debug
/// output.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider type: "openai" or "azure"
    pub provider: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    pub max_tokens: usize,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("api_version", &self.api_version)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ProviderConfig {
    pub fn from_llm_config(llm: &crate::config::LlmConfig) -> Self {
        Self {
            provider: llm.provider.clone(),
            model: llm.model.clone(),
            timeout_secs: llm.timeout_secs,
            temperature: llm.temperature,
            api_key: None,
            api_base: llm.api_base.clone(),
            api_version: llm.api_version.clone(),
            max_tokens: llm.max_tokens,
        }
    }
}

/// Create a shared client from configuration
pub fn create_client(config: &ProviderConfig) -> Result<SharedClient> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiClient::new(
            config.clone(),
            ApiFlavor::OpenAi,
        )?)),
        "azure" => Ok(Arc::new(OpenAiClient::new(
            config.clone(),
            ApiFlavor::Azure,
        )?)),
        _ => Err(EnrichError::Config(format!(
            "Unknown provider: {}. Supported: openai, azure",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_round_trip_keeps_order() {
        let request = CompletionRequest::new(InstructionId::FileContent)
            .var("readme_section", json!(["installation"]))
            .var("file_info", "x".repeat(50))
            .var("filename", "setup.cfg");

        let mut payload = request.payload();
        payload["file_info"] = json!("xx");
        let shrunk = request.with_payload(&payload);

        let names: Vec<&str> = shrunk.variables.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["readme_section", "file_info", "filename"]);
        assert_eq!(shrunk.variable("file_info"), Some(&json!("xx")));
        assert_eq!(shrunk.variable("filename"), Some(&json!("setup.cfg")));
    }

    #[test]
    fn test_provider_config_debug_redacts_key() {
        let config = ProviderConfig {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
            temperature: 0.0,
            api_key: Some("sk-secret".to_string()),
            api_base: None,
            api_version: None,
            max_tokens: 1024,
        };
        let debug = format!("{:?}", config);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-secret"));
        assert!(!serde_json::to_string(&config).unwrap().contains("sk-secret"));
    }

    #[test]
    fn test_unknown_provider() {
        let config = ProviderConfig {
            provider: "carrier-pigeon".to_string(),
            model: String::new(),
            timeout_secs: 30,
            temperature: 0.0,
            api_key: None,
            api_base: None,
            api_version: None,
            max_tokens: 1024,
        };
        assert!(matches!(create_client(&config), Err(EnrichError::Config(_))));
    }
}
