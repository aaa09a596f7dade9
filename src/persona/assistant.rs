//! Assistant persona: instructions, capabilities and personality feeding
//! the hybrid coordinator.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::config::{expand_path, AssistantSettings};
use crate::coordinator::{HybridCoordinator, Route};
use crate::error::{Error, Result};
use crate::files::FileOrganizer;
use crate::scheduler::TaskScheduler;
use crate::types::{ConversationContext, ResponseEnvelope};

use super::instructions::{FileInstructionSource, InlineInstructionSource, InstructionSource};
use super::traits::{parser_for, TraitParser};
use super::types::{PersonaConfig, PersonaStatus, PersonalityTraits, TaskOutcome, BASE_CAPABILITIES};

// ─────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────

/// Turns of history rendered into the persona prompt
const PROMPT_HISTORY_TURNS: usize = 3;

pub const ERROR_MESSAGE: &str = "I apologize, but I encountered an error processing your request. \
Please try again or contact support if the problem persists.";

/// Tasks an assistant handles itself
pub const NATIVE_TASKS: &[&str] = &[
    "status_check",
    "capability_list",
    "reload_instructions",
    "organize_directory",
    "find_duplicates",
    "search_files",
    "list_scheduled_tasks",
    "update_capability",
];

pub fn supports_task(task_type: &str) -> bool {
    NATIVE_TASKS.contains(&task_type)
}

fn greeting(name: &str) -> String {
    format!("I am {}, your assistant. How can I help you today?", name)
}

// ─────────────────────────────────────────────────────────────────
// Services
// ─────────────────────────────────────────────────────────────────

/// Shared services handed to every assistant.
#[derive(Clone)]
pub struct AssistantServices {
    pub coordinator: Arc<HybridCoordinator>,
    pub files: Arc<FileOrganizer>,
    pub scheduler: Arc<TaskScheduler>,
}

#[derive(Default)]
struct AssistantState {
    instructions: String,
    traits: PersonalityTraits,
    capabilities: BTreeMap<String, String>,
    active: bool,
}

// ─────────────────────────────────────────────────────────────────
// Assistant
// ─────────────────────────────────────────────────────────────────

pub struct Assistant {
    config: PersonaConfig,
    source: Option<Box<dyn InstructionSource>>,
    parser: Box<dyn TraitParser>,
    services: AssistantServices,
    state: RwLock<AssistantState>,
}

impl Assistant {
    pub fn new(
        config: PersonaConfig,
        source: Option<Box<dyn InstructionSource>>,
        services: AssistantServices,
    ) -> Self {
        let parser = parser_for(config.trait_format);
        let state = AssistantState {
            capabilities: config.capabilities.clone(),
            ..Default::default()
        };
        Self {
            config,
            source,
            parser,
            services,
            state: RwLock::new(state),
        }
    }

    /// Build from a `[[assistants]]` entry. The preferred model is
    /// classified against the coordinator's routing policy here, once.
    pub fn from_settings(settings: &AssistantSettings, services: AssistantServices) -> Self {
        let preferred_model = settings
            .preferred_model
            .as_deref()
            .map(|raw| services.coordinator.policy().classify(raw));

        let source: Option<Box<dyn InstructionSource>> =
            match (&settings.instructions_file, &settings.instructions) {
                (Some(path), _) => Some(Box::new(FileInstructionSource::new(expand_path(path)))),
                (None, Some(text)) => Some(Box::new(InlineInstructionSource::new(text.clone()))),
                (None, None) => None,
            };

        let config = PersonaConfig {
            name: settings.name.clone(),
            description: settings.description.clone(),
            preferred_model,
            trait_format: settings.trait_format,
            capabilities: settings.capabilities.clone(),
        };
        Self::new(config, source, services)
    }

    pub fn key(&self) -> String {
        self.config.key()
    }

    // ─────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────

    pub async fn initialize(&self) {
        self.load_instructions().await;
        let mut state = self.state.write();
        state.active = true;
        info!(
            assistant = %self.key(),
            instructions_loaded = !state.instructions.is_empty(),
            capabilities = state.capabilities.len(),
            "Assistant initialized"
        );
    }

    /// Re-read instructions and re-parse traits; returns the instruction length.
    pub async fn reload(&self) -> usize {
        let length = self.load_instructions().await;
        info!(assistant = %self.key(), instructions_length = length, "Configuration reloaded");
        length
    }

    pub fn shutdown(&self) {
        self.state.write().active = false;
        info!(assistant = %self.key(), "Assistant shut down");
    }

    /// A missing or unreadable source falls back to a greeting.
    async fn load_instructions(&self) -> usize {
        let instructions = match &self.source {
            Some(source) => match source.load().await {
                Ok(text) => text,
                Err(e) => {
                    warn!(assistant = %self.key(), error = %e, "Instructions unavailable, using greeting");
                    greeting(&self.config.name)
                }
            },
            None => {
                warn!(assistant = %self.key(), "No instructions configured, using greeting");
                greeting(&self.config.name)
            }
        };
        let traits = self.parser.parse(&instructions);
        let length = instructions.len();

        let mut state = self.state.write();
        state.instructions = instructions;
        state.traits = traits;
        length
    }

    // ─────────────────────────────────────────────────────────────
    // Messages
    // ─────────────────────────────────────────────────────────────

    /// Answer a message in character.
    pub async fn process_message(
        &self,
        message: &str,
        context: Option<&ConversationContext>,
    ) -> ResponseEnvelope {
        let key = self.key();
        let started = Instant::now();
        debug!(assistant = %key, preview = %preview(message), "Processing message");

        self.load_instructions().await;
        let prompt = self.build_prompt(message, context);

        let generation = self
            .services
            .coordinator
            .generate(&prompt, self.config.preferred_model.as_ref(), context, None)
            .await;

        let mut metadata = Map::new();
        metadata.insert("assistant".into(), json!(key));
        metadata.insert("processing_time".into(), json!(Utc::now().to_rfc3339()));

        if let Route::Failed { error } = &generation.route {
            error!(assistant = %key, error = %error, "Message processing failed");
            metadata.insert("error".into(), json!(error));
            return ResponseEnvelope::failure(
                key,
                ERROR_MESSAGE,
                vec!["error_occurred".to_string()],
                metadata,
            );
        }

        let (instructions_len, capabilities) = {
            let state = self.state.read();
            (
                state.instructions.len(),
                state.capabilities.keys().cloned().collect::<Vec<_>>(),
            )
        };
        metadata.insert("instructions_version".into(), json!(instructions_len));
        metadata.insert("capabilities_used".into(), json!(capabilities));
        metadata.insert("elapsed_ms".into(), json!(started.elapsed().as_millis() as u64));
        metadata.insert("model".into(), json!(generation.route.model()));
        metadata.insert("route".into(), json!(generation.route.label()));

        ResponseEnvelope::success(
            key,
            generation.text.trim(),
            vec!["message_processed".to_string()],
            metadata,
        )
    }

    fn build_prompt(&self, message: &str, context: Option<&ConversationContext>) -> String {
        let state = self.state.read();
        let name = &self.config.name;
        let mut parts: Vec<String> = Vec::new();

        if !state.instructions.is_empty() {
            parts.push(state.instructions.clone());
        }

        if !state.capabilities.is_empty() {
            let lines: Vec<String> = state
                .capabilities
                .iter()
                .map(|(cap, desc)| format!("- {}: {}", cap, desc))
                .collect();
            parts.push(format!("Available capabilities:\n{}", lines.join("\n")));
        }

        if !state.traits.is_empty() {
            let lines: Vec<String> = state
                .traits
                .iter()
                .map(|(k, v)| format!("- {}: {}", k, v))
                .collect();
            parts.push(format!("Personality traits to embody:\n{}", lines.join("\n")));
        }

        if let Some(ctx) = context.filter(|c| !c.conversation_history.is_empty()) {
            parts.push("Recent conversation context:".to_string());
            for turn in ctx.recent(PROMPT_HISTORY_TURNS) {
                parts.push(format!("User: {}", turn.user));
                parts.push(format!("{}: {}", name, turn.assistant));
            }
        }

        parts.push("---".to_string());
        parts.push(format!("Current user message: {}", message));
        parts.push(format!(
            "Please respond as {}, following all instructions and embodying the personality traits above.",
            name
        ));

        parts.join("\n\n")
    }

    // ─────────────────────────────────────────────────────────────
    // Status / Capabilities
    // ─────────────────────────────────────────────────────────────

    pub fn status(&self) -> PersonaStatus {
        let state = self.state.read();
        PersonaStatus {
            name: self.config.name.clone(),
            active: state.active,
            model: self
                .config
                .preferred_model
                .as_ref()
                .map(|m| m.name().to_string()),
            instructions_loaded: !state.instructions.is_empty(),
            instructions_length: state.instructions.len(),
            capabilities: state.capabilities.clone(),
            personality_traits: state.traits.clone(),
            configuration_file: self.source.as_ref().and_then(|s| s.location()),
            description: self.config.description.clone(),
        }
    }

    /// Base capabilities plus configured ones.
    pub fn capabilities(&self) -> Map<String, Value> {
        let mut all: Map<String, Value> = BASE_CAPABILITIES
            .iter()
            .map(|cap| (cap.to_string(), Value::Bool(true)))
            .collect();
        for (cap, desc) in &self.state.read().capabilities {
            all.insert(cap.clone(), Value::String(desc.clone()));
        }
        all
    }

    pub fn update_capability(&self, capability: &str, enabled: bool, description: Option<&str>) {
        let mut state = self.state.write();
        if enabled {
            state.capabilities.insert(
                capability.to_string(),
                description.unwrap_or("enabled").to_string(),
            );
        } else {
            state.capabilities.remove(capability);
        }
        info!(assistant = %self.key(), capability, enabled, "Capability updated");
    }

    // ─────────────────────────────────────────────────────────────
    // Tasks
    // ─────────────────────────────────────────────────────────────

    pub async fn execute_task(&self, task_type: &str, params: &Value) -> TaskOutcome {
        info!(assistant = %self.key(), task_type, "Task started");
        let result = self.run_task(task_type, params).await;
        match &result {
            Ok(_) => info!(assistant = %self.key(), task_type, "Task completed"),
            Err(e) => error!(assistant = %self.key(), task_type, error = %e, "Task failed"),
        }
        TaskOutcome::from_result(task_type, result)
    }

    async fn run_task(&self, task_type: &str, params: &Value) -> Result<Value> {
        match task_type {
            "status_check" => Ok(serde_json::to_value(self.status())?),
            "capability_list" => Ok(Value::Object(self.capabilities())),
            "reload_instructions" => {
                let length = self.reload().await;
                Ok(json!({ "reloaded": true, "instructions_length": length }))
            }
            "organize_directory" => {
                let dir = path_param(params, "directory", task_type)?;
                let create_subdirs = bool_param(params, "create_subdirs", true);
                let files = self.services.files.clone();
                let report = blocking(move || files.organize(&dir, create_subdirs)).await?;
                Ok(serde_json::to_value(report)?)
            }
            "find_duplicates" => {
                let dir = path_param(params, "directory", task_type)?;
                let files = self.services.files.clone();
                let report = blocking(move || files.find_duplicates(&dir)).await?;
                Ok(serde_json::to_value(report)?)
            }
            "search_files" => {
                let dir = path_param(params, "directory", task_type)?;
                let pattern = str_param(params, "pattern", task_type)?;
                let include_content = bool_param(params, "include_content", false);
                let files = self.services.files.clone();
                let report =
                    blocking(move || files.search(&dir, &pattern, include_content)).await?;
                Ok(serde_json::to_value(report)?)
            }
            "list_scheduled_tasks" => Ok(serde_json::to_value(self.services.scheduler.status())?),
            "update_capability" => {
                let capability = str_param(params, "capability", task_type)?;
                let enabled = bool_param(params, "enabled", true);
                let description = params.get("description").and_then(Value::as_str);
                self.update_capability(&capability, enabled, description);
                Ok(Value::Object(self.capabilities()))
            }
            other => Err(Error::UnsupportedTask {
                task_type: other.to_string(),
            }),
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("blocking task failed: {}", e)))?
}

fn str_param(params: &Value, key: &str, task_type: &str) -> Result<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_task_parameters(task_type, format!("missing '{}'", key)))
}

fn path_param(params: &Value, key: &str, task_type: &str) -> Result<PathBuf> {
    str_param(params, key, task_type).map(|s| PathBuf::from(expand_path(&s)))
}

fn bool_param(params: &Value, key: &str, default: bool) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn preview(message: &str) -> String {
    message.chars().take(50).collect()
}
