//! Configuration Types
//!
//! All configuration structures with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ai::UnitEncoding;
use crate::constants::{budget, enrichment, provider, retry};
use crate::types::{EnrichError, Result};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Completion provider settings
    pub llm: LlmConfig,

    /// Payload budgets
    pub budget: BudgetConfig,

    pub retry: RetryConfig,

    /// Node enrichment settings
    pub enrichment: EnrichmentConfig,

    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            budget: BudgetConfig::default(),
            retry: RetryConfig::default(),
            enrichment: EnrichmentConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `EnrichError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(EnrichError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(EnrichError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if let Some(base) = &self.llm.api_base
            && let Err(e) = url::Url::parse(base)
        {
            return Err(EnrichError::Config(format!(
                "LLM api_base is not a valid URL ({}): {}",
                base, e
            )));
        }

        if self.retry.max_attempts == 0 {
            return Err(EnrichError::Config(
                "retry.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.budget.request_max_units == 0 {
            return Err(EnrichError::Config(
                "budget.request_max_units must be greater than 0".to_string(),
            ));
        }

        if !(self.budget.escalation_ratio > 0.0 && self.budget.escalation_ratio < 1.0) {
            return Err(EnrichError::Config(format!(
                "budget.escalation_ratio must be between 0.0 and 1.0 (exclusive), got {}",
                self.budget.escalation_ratio
            )));
        }

        if self.enrichment.max_files_per_node == 0 {
            return Err(EnrichError::Config(
                "enrichment.max_files_per_node must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: openai or azure
    pub provider: String,

    /// Model name (deployment name for azure)
    pub model: String,

    /// Custom API base URL (required for azure)
    pub api_base: Option<String>,

    /// API version (azure only)
    pub api_version: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Temperature for generation (0.0 = deterministic)
    pub temperature: f32,

    /// Maximum tokens to generate per completion
    pub max_tokens: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: provider::DEFAULT_MODEL.to_string(),
            api_base: None,
            api_version: None,
            timeout_secs: provider::DEFAULT_TIMEOUT_SECS,
            temperature: 0.0,
            max_tokens: provider::DEFAULT_MAX_TOKENS,
        }
    }
}

// =============================================================================
// Budget Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Unit encoding used to measure payloads
    pub encoding: UnitEncoding,

    pub request_max_units: usize,

    /// Excerpt size for non-code files
    pub snippet_units: usize,

    /// Excerpt size per function/class/statement
    pub declaration_units: usize,

    pub category_batch_units: usize,

    /// Forced truncation target after a size-limit rejection
    pub escalation_ratio: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            encoding: UnitEncoding::Cl100k,
            request_max_units: budget::REQUEST_MAX_UNITS,
            snippet_units: budget::SNIPPET_UNITS,
            declaration_units: budget::DECLARATION_UNITS,
            category_batch_units: budget::CATEGORY_BATCH_UNITS,
            escalation_ratio: budget::ESCALATION_RATIO,
        }
    }
}

// =============================================================================
// Retry Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            delay_ms: retry::DELAY_MS,
        }
    }
}

// =============================================================================
// Enrichment Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Supported files processed per folder; the rest are listed as dropped
    pub max_files_per_node: usize,

    /// Extensions without dot, matched case-insensitively
    pub supported_extensions: Vec<String>,

    /// Exact file names accepted regardless of extension
    pub supported_filenames: Vec<String>,

    /// Extensions decomposed into functions, classes and top-level code
    pub structural_extensions: Vec<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            max_files_per_node: enrichment::MAX_FILES_PER_NODE,
            supported_extensions: owned(enrichment::SUPPORTED_EXTENSIONS),
            supported_filenames: owned(enrichment::SUPPORTED_FILENAMES),
            structural_extensions: owned(enrichment::STRUCTURAL_EXTENSIONS),
        }
    }
}

// =============================================================================
// Output Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving one workspace per run
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("readloom/json_output"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.budget.request_max_units, 10_000);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.enrichment.max_files_per_node, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.llm.temperature = 3.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.budget.escalation_ratio = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.llm.api_base = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("encoding = \"cl100k\""));
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
