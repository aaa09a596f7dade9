//! Core types for the persona system.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ModelId;

// ─────────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────────

/// How personality traits are read from instruction text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraitFormat {
    /// Bullet list under a "personality" / "traits" line.
    #[default]
    Heuristic,
    /// Fenced ```traits block holding TOML key/value pairs.
    Structured,
}

impl fmt::Display for TraitFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraitFormat::Heuristic => write!(f, "heuristic"),
            TraitFormat::Structured => write!(f, "structured"),
        }
    }
}

/// A single trait value; bare bullets become `Flag(true)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraitValue {
    Flag(bool),
    Text(String),
}

impl fmt::Display for TraitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraitValue::Flag(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            TraitValue::Text(s) => f.write_str(s),
        }
    }
}

pub type PersonalityTraits = BTreeMap<String, TraitValue>;

// ─────────────────────────────────────────────────────────────────
// Persona Config
// ─────────────────────────────────────────────────────────────────

/// Resolved persona definition, built once from configuration.
#[derive(Debug, Clone)]
pub struct PersonaConfig {
    pub name: String,
    pub description: String,
    /// None lets the coordinator choose.
    pub preferred_model: Option<ModelId>,
    pub trait_format: TraitFormat,
    pub capabilities: BTreeMap<String, String>,
}

impl PersonaConfig {
    /// Routing key.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Capabilities every persona has regardless of configuration.
pub const BASE_CAPABILITIES: &[&str] = &[
    "natural_language_processing",
    "task_execution",
    "status_reporting",
    "instruction_reloading",
];

// ─────────────────────────────────────────────────────────────────
// Status & Task Outcome
// ─────────────────────────────────────────────────────────────────

/// Diagnostic snapshot of one persona.
#[derive(Debug, Clone, Serialize)]
pub struct PersonaStatus {
    pub name: String,
    pub active: bool,
    pub model: Option<String>,
    pub instructions_loaded: bool,
    pub instructions_length: usize,
    pub capabilities: BTreeMap<String, String>,
    pub personality_traits: PersonalityTraits,
    pub configuration_file: Option<String>,
    pub description: String,
}

/// Result of `execute_task`, rendered at the boundary.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub task_type: String,
    pub timestamp: DateTime<Utc>,
}

impl TaskOutcome {
    pub fn from_result(task_type: &str, result: crate::error::Result<serde_json::Value>) -> Self {
        let (success, result, error) = match result {
            Ok(value) => (true, Some(value), None),
            Err(e) => (false, None, Some(e.to_string())),
        };
        Self {
            success,
            result,
            error,
            task_type: task_type.to_string(),
            timestamp: Utc::now(),
        }
    }
}
