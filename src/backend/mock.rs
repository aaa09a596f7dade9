//! Mock backend for testing
//!
//! Scriptable GenerationBackend with call counting.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::types::ModelKind;

use super::{BackendHealth, GenerationBackend, GenerationRequest};

// ─────────────────────────────────────────────────────────────────
// Mock Behaviour
// ─────────────────────────────────────────────────────────────────

/// What `generate` does
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Reply "[model] prompt"
    Echo,
    /// Always reply with this text
    Fixed(String),
    /// Always fail
    Fail,
    /// Answer with no text
    Empty,
    /// Panic inside `generate`
    Panic,
}

// ─────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────

pub struct MockBackend {
    kind: ModelKind,
    behavior: MockBehavior,
    models: Vec<String>,
    fail_listing: bool,
    calls: RwLock<Vec<GenerationRequest>>,
}

impl MockBackend {
    pub fn local() -> Self {
        Self::new(ModelKind::Local)
    }

    pub fn remote() -> Self {
        Self::new(ModelKind::Remote)
    }

    fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            behavior: MockBehavior::Echo,
            models: Vec::new(),
            fail_listing: false,
            calls: RwLock::new(Vec::new()),
        }
    }

    pub fn with_models(mut self, models: Vec<&str>) -> Self {
        self.models = models.into_iter().map(String::from).collect();
        self
    }

    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn fixed(self, text: &str) -> Self {
        self.with_behavior(MockBehavior::Fixed(text.to_string()))
    }

    /// Fail generation, model listing and health checks
    pub fn failing(mut self) -> Self {
        self.behavior = MockBehavior::Fail;
        self.fail_listing = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().len()
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.calls.read().last().cloned()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    fn name(&self) -> &'static str {
        match self.kind {
            ModelKind::Local => "mock-local",
            ModelKind::Remote => "mock-remote",
        }
    }

    fn kind(&self) -> ModelKind {
        self.kind
    }

    async fn health_check(&self) -> Result<BackendHealth> {
        if self.fail_listing {
            return Ok(BackendHealth::down("mock backend down"));
        }
        Ok(BackendHealth::ok())
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        if self.fail_listing {
            return Err(Error::backend_unavailable(self.name(), "mock listing failure"));
        }
        Ok(self.models.clone())
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Option<String>> {
        self.calls.write().push(request.clone());

        match &self.behavior {
            MockBehavior::Echo => Ok(Some(format!("[{}] {}", request.model, request.prompt))),
            MockBehavior::Fixed(text) => Ok(Some(text.clone())),
            MockBehavior::Fail => Err(Error::backend_request(self.name(), "mock generation failure")),
            MockBehavior::Empty => Ok(None),
            MockBehavior::Panic => panic!("mock backend panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_records_calls() {
        let backend = MockBackend::local();
        let out = backend
            .generate(GenerationRequest::new("m:1", "hello"))
            .await
            .unwrap();
        assert_eq!(out.as_deref(), Some("[m:1] hello"));
        assert_eq!(backend.call_count(), 1);
        assert_eq!(backend.last_request().map(|r| r.model).as_deref(), Some("m:1"));
    }

    #[tokio::test]
    async fn test_failing() {
        let backend = MockBackend::remote().failing();
        assert!(backend.generate(GenerationRequest::new("gpt-4", "x")).await.is_err());
        assert!(backend.list_models().await.is_err());
    }
}
