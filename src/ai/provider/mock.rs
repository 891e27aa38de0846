//! Scripted completion client for tests

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use super::{Completion, CompletionClient, CompletionRequest, TokenUsage};
use crate::types::CompletionError;

type Script = dyn Fn(&CompletionRequest, u32) -> Result<Completion, CompletionError> + Send + Sync;

/// Client whose replies come from a closure of (request, 1-based call number)
pub struct MockClient {
    script: Box<Script>,
    calls: AtomicU32,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockClient {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&CompletionRequest, u32) -> Result<Completion, CompletionError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always succeeds with content valid for every result schema
    pub fn succeeding() -> Self {
        Self::new(|request, _| Ok(universal_completion(request)))
    }

    pub fn always_transient() -> Self {
        Self::new(|_, n| Err(CompletionError::transient("mock", format!("hiccup {}", n))))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Reply naming the instruction and a variable, so tests can tell calls apart
pub fn universal_completion(request: &CompletionRequest) -> Completion {
    let subject = request
        .variable("filename")
        .or_else(|| request.variable("current_module"))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    Completion {
        content: json!({
            "Description": format!("{} for {}", request.instruction, subject),
            "Technologies": ["Python"],
            "Rating": "7",
            "ReadmeSection": "main_modules",
            "CodeExtractions": format!("excerpt of {}", subject)
        }),
        usage: TokenUsage::new(10, 5),
        cost_usd: 0.0001,
    }
}

#[async_trait]
impl CompletionClient for MockClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());
        tokio::task::yield_now().await;
        (self.script)(request, n)
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
