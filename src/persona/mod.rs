//! Persona system: assistants defined by instruction files and configuration.
//!
//! An assistant reads its instructions before every message, extracts
//! personality traits from them, and builds the prompt handed to the
//! hybrid coordinator.

pub mod assistant;
pub mod instructions;
pub mod registry;
pub mod traits;
pub mod types;

pub use assistant::{supports_task, Assistant, AssistantServices};
pub use registry::{bundled_assistants, bundled_personas, install_instructions};
pub use types::{PersonaStatus, TaskOutcome, TraitFormat};
