//! Usage Accounting
//!
//! Run-wide accumulator for completion usage and cost. One instance is
//! created per run and handed to every task by reference; concurrent
//! branches update it with relaxed atomic increments.
//!
//! ```ignore
//! let usage = Arc::new(UsageTracker::new(run_id));
//! usage.record_completion(InstructionId::FileContent, &completion);
//! let summary = usage.summary();
//! ```

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::prompt::InstructionId;
use super::provider::Completion;

/// Why a logical call resolved to the default instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackCause {
    /// Transient failures exhausted the attempts
    Transient,
    /// The response did not match the target schema
    Schema,
}

impl std::fmt::Display for FallbackCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient => write!(f, "retries exhausted"),
            Self::Schema => write!(f, "schema validation failed"),
        }
    }
}

/// Thread-safe usage accumulator
pub struct UsageTracker {
    run_id: String,
    start_time: Instant,
    logical_calls: AtomicU64,
    invocations: AtomicU64,
    retries: AtomicU64,
    transient_fallbacks: AtomicU64,
    schema_fallbacks: AtomicU64,
    truncations: AtomicU64,
    escalations: AtomicU64,
    fatal_size_errors: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    /// Cost stored as microdollars for atomic ops
    cost_micros: AtomicU64,
    per_instruction: DashMap<InstructionId, u64>,
}

pub type SharedUsage = Arc<UsageTracker>;

/// Serializable snapshot of a tracker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub run_id: String,
    pub duration_ms: u64,
    pub logical_calls: u64,
    pub invocations: u64,
    pub retries: u64,
    pub fallbacks: BTreeMap<FallbackCause, u64>,
    pub truncations: u64,
    pub escalations: u64,
    pub fatal_size_errors: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_cost_usd: f64,
    pub per_instruction: BTreeMap<String, u64>,
}

impl UsageTracker {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            start_time: Instant::now(),
            logical_calls: AtomicU64::new(0),
            invocations: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            transient_fallbacks: AtomicU64::new(0),
            schema_fallbacks: AtomicU64::new(0),
            truncations: AtomicU64::new(0),
            escalations: AtomicU64::new(0),
            fatal_size_errors: AtomicU64::new(0),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
            cost_micros: AtomicU64::new(0),
            per_instruction: DashMap::new(),
        }
    }

    pub fn shared(run_id: impl Into<String>) -> SharedUsage {
        Arc::new(Self::new(run_id))
    }

    pub fn record_call(&self, instruction: InstructionId) {
        self.logical_calls.fetch_add(1, Ordering::Relaxed);
        *self.per_instruction.entry(instruction).or_insert(0) += 1;
    }

    pub fn record_invocation(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_truncation(&self) {
        self.truncations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_escalation(&self) {
        self.escalations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fatal_size(&self) {
        self.fatal_size_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self, cause: FallbackCause) {
        let counter = match cause {
            FallbackCause::Transient => &self.transient_fallbacks,
            FallbackCause::Schema => &self.schema_fallbacks,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record tokens and cost of a successful completion
    pub fn record_completion(&self, completion: &Completion) {
        self.input_tokens
            .fetch_add(completion.usage.input_tokens as u64, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(completion.usage.output_tokens as u64, Ordering::Relaxed);
        let cost_micros = (completion.cost_usd * 1_000_000.0) as u64;
        self.cost_micros.fetch_add(cost_micros, Ordering::Relaxed);
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    pub fn total_cost_usd(&self) -> f64 {
        self.cost_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    pub fn summary(&self) -> UsageSummary {
        let mut fallbacks = BTreeMap::new();
        fallbacks.insert(
            FallbackCause::Transient,
            self.transient_fallbacks.load(Ordering::Relaxed),
        );
        fallbacks.insert(
            FallbackCause::Schema,
            self.schema_fallbacks.load(Ordering::Relaxed),
        );

        UsageSummary {
            run_id: self.run_id.clone(),
            duration_ms: self.start_time.elapsed().as_millis() as u64,
            logical_calls: self.logical_calls.load(Ordering::Relaxed),
            invocations: self.invocations(),
            retries: self.retries.load(Ordering::Relaxed),
            fallbacks,
            truncations: self.truncations.load(Ordering::Relaxed),
            escalations: self.escalations.load(Ordering::Relaxed),
            fatal_size_errors: self.fatal_size_errors.load(Ordering::Relaxed),
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
            total_cost_usd: self.total_cost_usd(),
            per_instruction: self
                .per_instruction
                .iter()
                .map(|e| (e.key().as_str().to_string(), *e.value()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::TokenUsage;
    use serde_json::json;

    #[test]
    fn test_record_completion() {
        let usage = UsageTracker::new("run-1");
        let completion = Completion {
            content: json!({}),
            usage: TokenUsage::new(120, 30),
            cost_usd: 0.0025,
        };
        usage.record_completion(&completion);
        usage.record_completion(&completion);

        let summary = usage.summary();
        assert_eq!(summary.input_tokens, 240);
        assert_eq!(summary.output_tokens, 60);
        assert!((summary.total_cost_usd - 0.005).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_concurrent_updates() {
        let usage = UsageTracker::shared("run-2");
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let usage = Arc::clone(&usage);
                tokio::spawn(async move {
                    for _ in 0..100 {
                        usage.record_call(InstructionId::FileContent);
                        usage.record_invocation();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let summary = usage.summary();
        assert_eq!(summary.logical_calls, 1600);
        assert_eq!(summary.invocations, 1600);
        assert_eq!(summary.per_instruction.get("file_content"), Some(&1600));
    }

    #[test]
    fn test_fallback_breakdown() {
        let usage = UsageTracker::new("run-3");
        usage.record_fallback(FallbackCause::Transient);
        usage.record_fallback(FallbackCause::Schema);
        usage.record_fallback(FallbackCause::Schema);

        let summary = usage.summary();
        assert_eq!(summary.fallbacks[&FallbackCause::Transient], 1);
        assert_eq!(summary.fallbacks[&FallbackCause::Schema], 2);
    }
}
