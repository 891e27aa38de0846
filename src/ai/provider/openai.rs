//! OpenAI-compatible Chat Completions Client
//!
//! Talks to either the public OpenAI API or an Azure OpenAI deployment.
//! Failures are mapped to the two boundary kinds: 400/413 become
//! `SizeLimit`, every other failure is `Transient`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use super::{Completion, CompletionClient, CompletionRequest, ProviderConfig, TokenUsage};
use crate::ai::validation::extract_json_from_response;
use crate::constants::provider::{DEFAULT_AZURE_API_VERSION, DEFAULT_OPENAI_BASE};
use crate::types::{CompletionError, EnrichError, Result};

/// Which deployment style the endpoint follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFlavor {
    OpenAi,
    Azure,
}

impl ApiFlavor {
    fn name(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Azure => "azure",
        }
    }

    fn key_env(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Azure => "AZURE_OPENAI_API_KEY",
        }
    }
}

/// Chat Completions client with secure API key handling
pub struct OpenAiClient {
    flavor: ApiFlavor,
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    endpoint: Url,
    model: String,
    temperature: f32,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("flavor", &self.flavor)
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiClient {
    pub fn new(config: ProviderConfig, flavor: ApiFlavor) -> Result<Self> {
        let endpoint = Self::endpoint(&config, flavor)?;
        let api_key = config
            .api_key
            .or_else(|| std::env::var(flavor.key_env()).ok())
            .ok_or_else(|| {
                EnrichError::Config(format!(
                    "{} API key not found. Set {}",
                    flavor.name(),
                    flavor.key_env()
                ))
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EnrichError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            flavor,
            api_key: SecretString::from(api_key),
            endpoint,
            model: config.model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn endpoint(config: &ProviderConfig, flavor: ApiFlavor) -> Result<Url> {
        let raw = match flavor {
            ApiFlavor::OpenAi => {
                let base = config.api_base.as_deref().unwrap_or(DEFAULT_OPENAI_BASE);
                format!("{}/chat/completions", base.trim_end_matches('/'))
            }
            ApiFlavor::Azure => {
                let base = config.api_base.as_deref().ok_or_else(|| {
                    EnrichError::Config("azure provider requires llm.api_base".to_string())
                })?;
                let version = config
                    .api_version
                    .as_deref()
                    .unwrap_or(DEFAULT_AZURE_API_VERSION);
                format!(
                    "{}/openai/deployments/{}/chat/completions?api-version={}",
                    base.trim_end_matches('/'),
                    config.model,
                    version
                )
            }
        };
        Url::parse(&raw).map_err(|e| EnrichError::Config(format!("Invalid endpoint {}: {}", raw, e)))
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatCompletionRequest {
        let instruction = request.instruction.instruction();
        let system_content = match &request.schema {
            Some(schema) => {
                let schema_str = serde_json::to_string_pretty(schema)
                    .unwrap_or_else(|_| schema.to_string());
                format!(
                    "{}\n\nAlways respond with valid JSON matching this schema:\n\n```json\n{}\n```\n\nRespond ONLY with valid JSON, no explanation.",
                    instruction.system, schema_str
                )
            }
            None => format!(
                "{}\n\nAlways respond with valid JSON.",
                instruction.system
            ),
        };

        ChatCompletionRequest {
            // Azure routes by deployment in the URL
            model: match self.flavor {
                ApiFlavor::OpenAi => Some(self.model.clone()),
                ApiFlavor::Azure => None,
            },
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_content,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: instruction.render(&request.variables),
                },
            ],
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }

    fn fail(&self, message: impl Into<String>) -> CompletionError {
        CompletionError::transient(self.flavor.name(), message)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<Completion, CompletionError> {
        let start_time = Instant::now();
        let body = self.build_request(request);

        let builder = self.client.post(self.endpoint.clone()).json(&body);
        let builder = match self.flavor {
            ApiFlavor::OpenAi => builder.header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            ),
            ApiFlavor::Azure => builder.header("api-key", self.api_key.expose_secret()),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| self.fail(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(provider = self.flavor.name(), status = status.as_u16(), "API error");
            return Err(CompletionError::from_http_status(
                status.as_u16(),
                &format!("API error ({}): {}", status, text),
                self.flavor.name(),
            ));
        }

        let response_body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| self.fail(format!("failed to parse response: {}", e)))?;

        let usage = response_body
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let content_str = response_body
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| self.fail("no content in response"))?;

        let content = extract_json_from_response(content_str)
            .ok_or_else(|| self.fail("response is not JSON"))?;

        debug!(
            provider = self.flavor.name(),
            instruction = %request.instruction,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            tokens = usage.total(),
            "Completion received"
        );

        // The API does not report cost
        Ok(Completion {
            content,
            usage,
            cost_usd: 0.0,
        })
    }

    fn name(&self) -> &str {
        self.flavor.name()
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::prompt::InstructionId;
    use crate::types::ModuleResult;
    use crate::types::ResultSchema;
    use serde_json::json;

    fn config(provider: &str) -> ProviderConfig {
        ProviderConfig {
            provider: provider.to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
            temperature: 0.0,
            api_key: Some("test-key".to_string()),
            api_base: Some("https://example.openai.azure.com/".to_string()),
            api_version: Some("2024-06-01".to_string()),
            max_tokens: 512,
        }
    }

    #[test]
    fn test_azure_endpoint() {
        let client = OpenAiClient::new(config("azure"), ApiFlavor::Azure).unwrap();
        assert_eq!(
            client.endpoint.as_str(),
            "https://example.openai.azure.com/openai/deployments/gpt-4o-mini/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn test_new_takes_key_and_settings_from_config() {
        let client = OpenAiClient::new(config("openai"), ApiFlavor::OpenAi).unwrap();
        assert_eq!(client.api_key.expose_secret(), "test-key");
        assert_eq!(
            client.endpoint.as_str(),
            "https://example.openai.azure.com/chat/completions"
        );
        assert_eq!(client.model, "gpt-4o-mini");
        assert_eq!(client.max_tokens, 512);
    }

    #[test]
    fn test_azure_requires_base() {
        let mut cfg = config("azure");
        cfg.api_base = None;
        assert!(OpenAiClient::new(cfg, ApiFlavor::Azure).is_err());
    }

    #[test]
    fn test_build_request_embeds_schema_and_variables() {
        let client = OpenAiClient::new(config("openai"), ApiFlavor::OpenAi).unwrap();
        let request = CompletionRequest::new(InstructionId::RootFile)
            .var("filename", "setup.py")
            .var("file_extension", ".py")
            .var("num_lines", 42)
            .schema(ModuleResult::schema());

        let body = client.build_request(&request);
        assert_eq!(body.model.as_deref(), Some("gpt-4o-mini"));
        assert!(body.messages[0].content.contains("\"Technologies\""));
        assert!(body.messages[1].content.contains("setup.py"));
        assert!(body.messages[1].content.contains("42 lines"));

        let wire = serde_json::to_value(&body).unwrap();
        assert_eq!(wire["response_format"], json!({"type": "json_object"}));
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = OpenAiClient::new(config("openai"), ApiFlavor::OpenAi).unwrap();
        assert!(!format!("{:?}", client).contains("test-key"));
    }
}
