//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//!
//! ## Failure Classes
//!
//! - **Transient**: provider hiccup, recovered by bounded retry
//! - **SizeLimit**: payload rejected as too large, recovered by one truncation escalation
//! - **Schema**: response does not match the target schema, resolved to the default instance
//! - **SourceRead**: source content cannot be read, fatal for the whole run

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Completion Failure
// =============================================================================

/// Failure kind raised at the completion client boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network or provider hiccup, safe to retry
    Transient,
    /// Payload rejected because it is too large
    SizeLimit,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient => write!(f, "TRANSIENT"),
            Self::SizeLimit => write!(f, "SIZE_LIMIT"),
        }
    }
}

/// Typed failure returned by a completion client
#[derive(Debug, Clone, Error)]
#[error("[{provider}:{kind}] {message}")]
pub struct CompletionError {
    pub kind: FailureKind,
    pub message: String,
    pub provider: String,
}

impl CompletionError {
    pub fn transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
            provider: provider.into(),
        }
    }

    pub fn size_limit(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::SizeLimit,
            message: message.into(),
            provider: provider.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }

    pub fn is_size_limit(&self) -> bool {
        self.kind == FailureKind::SizeLimit
    }

    /// Map an HTTP status code from a provider to a failure kind.
    ///
    /// 400 and 413 are the statuses providers use for rejected context length.
    pub fn from_http_status(status: u16, message: &str, provider: &str) -> Self {
        match status {
            400 | 413 => Self::size_limit(provider, message),
            _ => Self::transient(provider, message),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum EnrichError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Completion Errors
    // -------------------------------------------------------------------------
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    /// Payload still over the cap after truncation or escalation
    #[error("Payload for {instruction} exceeds the size limit ({units} units, cap {cap})")]
    PayloadTooLarge {
        instruction: String,
        units: usize,
        cap: usize,
    },

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    /// Source content could not be read; aborts the run
    #[error("Failed to read source {}: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {message}")]
    Parse { message: String, path: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Checkpoint error in {document}: {message}")]
    Checkpoint { document: String, message: String },
}

pub type Result<T> = std::result::Result<T, EnrichError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl EnrichError {
    pub fn source_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceRead {
            path: path.into(),
            source,
        }
    }

    pub fn payload_too_large(instruction: impl Into<String>, units: usize, cap: usize) -> Self {
        Self::PayloadTooLarge {
            instruction: instruction.into(),
            units,
            cap,
        }
    }

    /// Fatal errors halt the whole run instead of degrading one node
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SourceRead { .. })
    }
}

// =============================================================================
// Tests
// =============================================================================
