//! Fake model provider for testing.
//!
//! Responses are matched by prompt substring, allowing tests to run without
//! network access or API costs.

use super::{CompletionRequest, ModelError, ModelProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// A fake model provider for testing.
///
/// Responses are matched by checking if the system prompt or user text
/// contains a registered substring. If no match is found, returns a default
/// response or an error.
#[derive(Debug)]
pub struct FakeModelProvider {
    /// Map of prompt substring -> response
    responses: RwLock<HashMap<String, String>>,
    default_response: Option<String>,
    calls: AtomicUsize,
}

impl Default for FakeModelProvider {
    fn default() -> Self {
        Self {
            responses: RwLock::new(HashMap::new()),
            default_response: Some("{}".to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeModelProvider {
    pub fn new() -> Self {
        Self {
            responses: RwLock::new(HashMap::new()),
            default_response: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a provider that returns a specific response for prompts
    /// containing a substring.
    pub fn with_response(prompt_contains: &str, response: &str) -> Self {
        let provider = Self::new();
        provider.add_response(prompt_contains, response);
        provider
    }

    /// Register a response for prompts containing a substring.
    pub fn add_response(&self, prompt_contains: &str, response: &str) {
        self.responses
            .write()
            .unwrap()
            .insert(prompt_contains.to_string(), response.to_string());
    }

    pub fn with_default_response(mut self, response: &str) -> Self {
        self.default_response = Some(response.to_string());
        self
    }

    /// Number of completion calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ModelProvider for FakeModelProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let haystack = format!("{}\n{}", request.system_prompt, request.user_text).to_lowercase();

        let responses = self.responses.read().unwrap();
        for (pattern, response) in responses.iter() {
            if haystack.contains(&pattern.to_lowercase()) {
                return Ok(response.clone());
            }
        }

        match &self.default_response {
            Some(response) => Ok(response.clone()),
            None => Err(ModelError::RequestFailed(format!(
                "FakeModelProvider: no response configured for prompt (first 100 chars): {}",
                haystack.chars().take(100).collect::<String>()
            ))),
        }
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
