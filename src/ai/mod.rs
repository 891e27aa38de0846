//! AI Integration Layer
//!
//! Completion client boundary, payload budgets, retry policy and usage
//! accounting.

pub mod budget;
pub mod prompt;
pub mod provider;
pub mod retry;
pub mod usage;
pub mod validation;

pub use budget::{BudgetEstimator, UnitEncoding};
pub use prompt::{CategoryRoute, Instruction, InstructionId, category_route};
pub use provider::{
    ApiFlavor, Completion, CompletionClient, CompletionRequest, OpenAiClient, ProviderConfig,
    SharedClient, TokenUsage, create_client,
};
pub use retry::{CallOutcome, RetryPolicy};
pub use usage::{FallbackCause, SharedUsage, UsageSummary, UsageTracker};
pub use validation::extract_json_from_response;
