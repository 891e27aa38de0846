//! Bounded Retry with Size-Limit Escalation
//!
//! Wraps one logical completion call:
//!
//! 1. Estimate the payload; if it is over the cap, truncate before the
//!    first attempt
//! 2. Retry `Transient` failures with a fixed delay, up to `max_attempts`
//! 3. On `SizeLimit` for a payload that was not truncated yet, force a
//!    truncation and invoke exactly once more
//! 4. Validate the response against the result schema
//!
//! Exhausted retries and schema mismatches resolve to the schema's default
//! instance. A payload that stays oversized is `EnrichError::PayloadTooLarge`.
//! With the default of three attempts the client sees at most four
//! invocations per logical call.

use backon::{ConstantBuilder, Retryable};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::budget::BudgetEstimator;
use super::provider::{Completion, CompletionClient, CompletionRequest};
use super::usage::{FallbackCause, UsageTracker};
use crate::constants::{budget, retry};
use crate::types::{CompletionError, EnrichError, NodeEnrichment, Result, ResultSchema};

/// Result of one logical call
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    Success(T),
    Fallback { value: T, cause: FallbackCause },
}

impl<T> CallOutcome<T> {
    pub fn value(&self) -> &T {
        match self {
            Self::Success(value) | Self::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Success(value) | Self::Fallback { value, .. } => value,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_enrichment(self) -> NodeEnrichment<T> {
        match self {
            Self::Success(value) => NodeEnrichment::enriched(value),
            Self::Fallback { value, cause } => NodeEnrichment::fallback(value, cause.to_string()),
        }
    }
}

/// Retry policy shared by every task of a run
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    estimator: BudgetEstimator,
    max_attempts: u32,
    delay: Duration,
    escalation_ratio: f64,
}

impl RetryPolicy {
    pub fn new(estimator: BudgetEstimator) -> Self {
        Self {
            estimator,
            max_attempts: retry::MAX_ATTEMPTS,
            delay: Duration::from_millis(retry::DELAY_MS),
            escalation_ratio: budget::ESCALATION_RATIO,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_escalation_ratio(mut self, ratio: f64) -> Self {
        self.escalation_ratio = ratio;
        self
    }

    pub fn from_config(estimator: BudgetEstimator, config: &crate::config::Config) -> Self {
        Self::new(estimator)
            .with_max_attempts(config.retry.max_attempts)
            .with_delay(Duration::from_millis(config.retry.delay_ms))
            .with_escalation_ratio(config.budget.escalation_ratio)
    }

    pub fn estimator(&self) -> &BudgetEstimator {
        &self.estimator
    }

    /// Run one logical call whose payload must stay within `cap` units
    pub async fn call<T: ResultSchema>(
        &self,
        client: &dyn CompletionClient,
        request: CompletionRequest,
        cap: usize,
        usage: &UsageTracker,
    ) -> Result<CallOutcome<T>> {
        let instruction = request.instruction;
        usage.record_call(instruction);

        let request = if request.schema.is_none() {
            request.schema(T::schema())
        } else {
            request
        };

        let payload = request.payload();
        let cost = self.estimator.estimate(&payload);
        let truncated = cost > cap;
        let request = if truncated {
            let shrunk = self.shrink(&payload, cap, instruction.as_str(), usage)?;
            usage.record_truncation();
            debug!(%instruction, cost, cap, "Payload truncated before first attempt");
            request.with_payload(&shrunk)
        } else {
            request
        };

        let attempt = AtomicU32::new(0);
        match self.run_chain(client, &request, &attempt, usage).await {
            Ok(completion) => Ok(self.validate(completion, instruction.as_str(), usage)),
            Err(err) if err.is_transient() => Ok(self.exhausted(instruction.as_str(), usage)),
            Err(err) => {
                if truncated {
                    usage.record_fatal_size();
                    return Err(EnrichError::payload_too_large(
                        instruction.as_str(),
                        self.estimator.estimate(&request.payload()),
                        cap,
                    ));
                }

                let target = (cost.min(cap) as f64 * self.escalation_ratio).floor() as usize;
                warn!(
                    %instruction,
                    cost,
                    target,
                    error = %err,
                    "Size limit hit, escalating with forced truncation"
                );
                usage.record_escalation();
                let shrunk = self.shrink(&payload, target, instruction.as_str(), usage)?;
                let escalated = request.with_payload(&shrunk);

                match self.invoke(client, &escalated, &attempt, usage).await {
                    Ok(completion) => Ok(self.validate(completion, instruction.as_str(), usage)),
                    Err(err) if err.is_size_limit() => {
                        usage.record_fatal_size();
                        Err(EnrichError::payload_too_large(
                            instruction.as_str(),
                            self.estimator.estimate(&shrunk),
                            target,
                        ))
                    }
                    Err(_) => Ok(self.exhausted(instruction.as_str(), usage)),
                }
            }
        }
    }

    fn shrink(
        &self,
        payload: &Value,
        cap: usize,
        instruction: &str,
        usage: &UsageTracker,
    ) -> Result<Value> {
        let shrunk = self.estimator.truncate(payload, cap);
        let units = self.estimator.estimate(&shrunk);
        if units > cap {
            usage.record_fatal_size();
            return Err(EnrichError::payload_too_large(instruction, units, cap));
        }
        Ok(shrunk)
    }

    /// Transient failures retried with a fixed delay
    async fn run_chain(
        &self,
        client: &dyn CompletionClient,
        request: &CompletionRequest,
        attempt: &AtomicU32,
        usage: &UsageTracker,
    ) -> std::result::Result<Completion, CompletionError> {
        let backoff = ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize);

        (|| self.invoke(client, request, attempt, usage))
            .retry(backoff)
            .when(CompletionError::is_transient)
            .notify(|_, delay: Duration| {
                usage.record_retry();
                debug!(delay_ms = delay.as_millis() as u64, "Retrying after fixed delay");
            })
            .await
    }

    async fn invoke(
        &self,
        client: &dyn CompletionClient,
        request: &CompletionRequest,
        attempt: &AtomicU32,
        usage: &UsageTracker,
    ) -> std::result::Result<Completion, CompletionError> {
        let n = attempt.fetch_add(1, Ordering::Relaxed) + 1;
        usage.record_invocation();

        match client.complete(request).await {
            Ok(completion) => {
                usage.record_completion(&completion);
                Ok(completion)
            }
            Err(err) => {
                warn!(
                    provider = client.name(),
                    instruction = %request.instruction,
                    attempt = n,
                    max_attempts = self.max_attempts,
                    cause = %err.kind,
                    error = %err.message,
                    "Completion attempt failed"
                );
                Err(err)
            }
        }
    }

    fn validate<T: ResultSchema>(
        &self,
        completion: Completion,
        instruction: &str,
        usage: &UsageTracker,
    ) -> CallOutcome<T> {
        match T::from_response(completion.content) {
            Ok(value) => CallOutcome::Success(value),
            Err(e) => {
                warn!(instruction, error = %e, "Response failed schema validation, using default");
                usage.record_fallback(FallbackCause::Schema);
                CallOutcome::Fallback {
                    value: T::default(),
                    cause: FallbackCause::Schema,
                }
            }
        }
    }

    fn exhausted<T: ResultSchema>(&self, instruction: &str, usage: &UsageTracker) -> CallOutcome<T> {
        warn!(
            instruction,
            max_attempts = self.max_attempts,
            "Retries exhausted, using default"
        );
        usage.record_fallback(FallbackCause::Transient);
        CallOutcome::Fallback {
            value: T::default(),
            cause: FallbackCause::Transient,
        }
    }
}
