//! Hybrid generation coordinator
//!
//! Picks a local or remote model for each prompt, calls it, and falls
//! back per policy. `generate` never returns an error; the outcome is
//! recorded in the returned [`Route`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{
    BackendHealth, GenerationBackend, GenerationRequest, ModelRegistry, OllamaBackend, OpenAiBackend,
    OpenAiConfig,
};
use crate::config::CrystalConfig;
use crate::error::Result;
use crate::types::{ConversationContext, ConversationTurn, ModelId};

pub const DEGRADED_MESSAGE: &str =
    "I'm sorry, but I'm unable to process your request right now. Please check the AI service configuration.";

pub const EMPTY_REMOTE_MESSAGE: &str = "I apologize, but I couldn't generate a response.";

// ─────────────────────────────────────────────────────────────────
// Routing Policy
// ─────────────────────────────────────────────────────────────────

/// Selection and fallback knobs, fixed at composition time
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    pub use_local_first: bool,
    pub fallback_to_api: bool,
    pub complex_prompt_chars: usize,
    pub complex_keywords: Vec<String>,
    pub remote_prefixes: Vec<String>,
    pub history_window: usize,
    pub temperature: f32,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub default_local: ModelId,
    pub default_remote: ModelId,
}

impl RoutingPolicy {
    pub fn from_config(config: &CrystalConfig) -> Self {
        let routing = &config.routing;
        Self {
            use_local_first: routing.use_local_first,
            fallback_to_api: routing.fallback_to_api,
            complex_prompt_chars: routing.complex_prompt_chars,
            complex_keywords: routing
                .complex_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            remote_prefixes: routing.remote_model_prefixes.clone(),
            history_window: routing.history_window,
            temperature: routing.temperature,
            system_prompt: routing.system_prompt.clone(),
            max_tokens: config.openai.max_tokens,
            default_local: ModelId::Local(strip_kind_prefix(&config.ollama.default_model)),
            default_remote: ModelId::Remote(strip_kind_prefix(&config.openai.model)),
        }
    }

    /// Classify a configured model name under this policy's prefixes
    pub fn classify(&self, raw: &str) -> ModelId {
        ModelId::classify(raw, &self.remote_prefixes)
    }

    /// Long or analytical prompts prefer the remote model
    pub fn is_complex(&self, prompt: &str) -> bool {
        if prompt.chars().count() > self.complex_prompt_chars {
            return true;
        }
        let lower = prompt.to_lowercase();
        self.complex_keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self::from_config(&CrystalConfig::default())
    }
}

fn strip_kind_prefix(raw: &str) -> String {
    let raw = raw.trim();
    raw.strip_prefix("local:")
        .or_else(|| raw.strip_prefix("remote:"))
        .unwrap_or(raw)
        .to_string()
}

// ─────────────────────────────────────────────────────────────────
// Generation Result
// ─────────────────────────────────────────────────────────────────

/// Which path produced the text
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Route {
    Local { model: String },
    Remote { model: String },
    /// Local attempt failed; the default remote model answered
    Fallback { from: String, to: String },
    /// No backend could be tried
    Degraded,
    /// The remote call raised
    Failed { error: String },
}

impl Route {
    pub fn model(&self) -> Option<&str> {
        match self {
            Route::Local { model } | Route::Remote { model } => Some(model),
            Route::Fallback { to, .. } => Some(to),
            Route::Degraded | Route::Failed { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Route::Local { .. } => "local",
            Route::Remote { .. } => "remote",
            Route::Fallback { .. } => "fallback",
            Route::Degraded => "degraded",
            Route::Failed { .. } => "failed",
        }
    }
}

/// Generated text plus how it was obtained; `text` is never empty
#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    pub text: String,
    pub route: Route,
}

impl Generation {
    fn new(text: String, route: Route) -> Self {
        Self { text, route }
    }

    fn degraded() -> Self {
        Self::new(DEGRADED_MESSAGE.to_string(), Route::Degraded)
    }

    fn failed(error: String) -> Self {
        Self::new(
            format!("I encountered an error while processing your request: {}", error),
            Route::Failed { error },
        )
    }
}

/// Model availability summary
#[derive(Debug, Clone, Serialize)]
pub struct ModelAvailability {
    pub local_models: Vec<String>,
    pub remote_available: bool,
    pub default_local: String,
    pub default_remote: String,
}

// ─────────────────────────────────────────────────────────────────
// Coordinator
// ─────────────────────────────────────────────────────────────────

pub struct HybridCoordinator {
    policy: RoutingPolicy,
    local: Option<Arc<dyn GenerationBackend>>,
    remote: Option<Arc<dyn GenerationBackend>>,
    registry: ModelRegistry,
}

impl HybridCoordinator {
    pub fn new(
        policy: RoutingPolicy,
        local: Option<Arc<dyn GenerationBackend>>,
        remote: Option<Arc<dyn GenerationBackend>>,
    ) -> Self {
        Self {
            policy,
            local,
            remote,
            registry: ModelRegistry::new(),
        }
    }

    /// Build backends from configuration
    pub fn from_config(config: &CrystalConfig) -> Result<Self> {
        let local: Option<Arc<dyn GenerationBackend>> = if config.ollama.enabled {
            Some(Arc::new(OllamaBackend::new(&config.ollama)?))
        } else {
            None
        };

        let remote: Option<Arc<dyn GenerationBackend>> = if config.openai.is_configured() {
            Some(Arc::new(OpenAiBackend::new(OpenAiConfig::from(&config.openai))?))
        } else {
            info!("Remote backend not configured (no API key or disabled)");
            None
        };

        Ok(Self::new(RoutingPolicy::from_config(config), local, remote))
    }

    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn has_local(&self) -> bool {
        self.local.is_some()
    }

    /// Re-probe the local backend for installed models
    pub async fn refresh_models(&self) -> usize {
        self.registry.refresh(self.local.as_ref()).await
    }

    /// Probe every configured backend, keyed by where it runs
    pub async fn backend_health(&self) -> BTreeMap<String, BackendHealth> {
        let mut report = BTreeMap::new();
        for backend in self.local.iter().chain(self.remote.iter()) {
            let health = backend
                .health_check()
                .await
                .unwrap_or_else(|e| BackendHealth::down(e.to_string()));
            debug!(
                backend = backend.name(),
                kind = %backend.kind(),
                operational = health.operational,
                "Backend probed"
            );
            report.insert(backend.kind().to_string(), health);
        }
        report
    }

    pub fn available_models(&self) -> ModelAvailability {
        ModelAvailability {
            local_models: self.registry.models(),
            remote_available: self.has_remote(),
            default_local: self.policy.default_local.name().to_string(),
            default_remote: self.policy.default_remote.name().to_string(),
        }
    }

    /// Model used when the caller gives no hint
    pub fn select_model(&self, prompt: &str) -> ModelId {
        if self.policy.is_complex(prompt) && self.has_remote() {
            return self.policy.default_remote.clone();
        }
        if !self.registry.is_empty() {
            return self.policy.default_local.clone();
        }
        self.policy.default_remote.clone()
    }

    /// Generate text for `prompt`, falling back per policy
    pub async fn generate(
        &self,
        prompt: &str,
        hint: Option<&ModelId>,
        context: Option<&ConversationContext>,
        max_tokens: Option<u32>,
    ) -> Generation {
        let available = self.registry.models();
        let model = hint
            .cloned()
            .unwrap_or_else(|| self.select_model(prompt))
            .reconcile(&available);
        let history = context
            .map(|c| c.recent(self.policy.history_window).to_vec())
            .unwrap_or_default();
        let max_tokens = max_tokens.unwrap_or(self.policy.max_tokens);

        debug!(model = %model, prompt_len = prompt.len(), "Generation started");

        if self.policy.use_local_first && model.is_local() {
            if available.iter().any(|m| m == model.name()) {
                if let Some(text) = self.try_local(model.name(), prompt, &history, max_tokens).await {
                    return Generation::new(
                        text,
                        Route::Local {
                            model: model.name().to_string(),
                        },
                    );
                }
            }

            if self.policy.fallback_to_api && self.has_remote() {
                let to = self.policy.default_remote.name().to_string();
                info!(from = %model, to = %to, "Falling back to remote model");
                return self
                    .call_remote(&to, prompt, &history, max_tokens)
                    .await
                    .map(|text| {
                        Generation::new(
                            text,
                            Route::Fallback {
                                from: model.name().to_string(),
                                to: to.clone(),
                            },
                        )
                    })
                    .unwrap_or_else(Generation::failed);
            }
        } else if model.is_remote() && self.has_remote() {
            return self
                .call_remote(model.name(), prompt, &history, max_tokens)
                .await
                .map(|text| {
                    Generation::new(
                        text,
                        Route::Remote {
                            model: model.name().to_string(),
                        },
                    )
                })
                .unwrap_or_else(Generation::failed);
        } else if self.has_local() {
            if let Some(first) = available.first() {
                if let Some(text) = self.try_local(first, prompt, &history, max_tokens).await {
                    return Generation::new(text, Route::Local { model: first.clone() });
                }
            }
        }

        warn!(model = %model, "No backend produced a response");
        Generation::degraded()
    }

    /// A local failure is logged and reported as no output
    async fn try_local(
        &self,
        model: &str,
        prompt: &str,
        history: &[ConversationTurn],
        max_tokens: u32,
    ) -> Option<String> {
        let backend = self.local.as_ref()?;
        match backend.generate(self.request(model, prompt, history, max_tokens)).await {
            Ok(Some(text)) => {
                info!(backend = backend.name(), model, "Local response generated");
                Some(text)
            }
            Ok(None) => {
                warn!(backend = backend.name(), model, "Local model returned no text");
                None
            }
            Err(e) => {
                warn!(backend = backend.name(), model, error = %e, "Local generation failed");
                None
            }
        }
    }

    /// Empty remote content becomes an apology; only transport errors fail
    async fn call_remote(
        &self,
        model: &str,
        prompt: &str,
        history: &[ConversationTurn],
        max_tokens: u32,
    ) -> std::result::Result<String, String> {
        let Some(backend) = self.remote.as_ref() else {
            return Err("remote backend not configured".to_string());
        };

        let mut request = self.request(model, prompt, history, max_tokens);
        request.system_prompt = Some(self.policy.system_prompt.clone());

        match backend.generate(request).await {
            Ok(Some(text)) => {
                info!(backend = backend.name(), model, "Remote response generated");
                Ok(text)
            }
            Ok(None) => Ok(EMPTY_REMOTE_MESSAGE.to_string()),
            Err(e) => {
                warn!(backend = backend.name(), model, error = %e, "Remote generation failed");
                Err(e.to_string())
            }
        }
    }

    fn request(
        &self,
        model: &str,
        prompt: &str,
        history: &[ConversationTurn],
        max_tokens: u32,
    ) -> GenerationRequest {
        GenerationRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            history: history.to_vec(),
            system_prompt: None,
            max_tokens,
            temperature: self.policy.temperature,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
