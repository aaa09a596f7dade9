//! Bundled personas: default assistant settings and instruction files
//! compiled into the binary.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::AssistantSettings;
use crate::error::{Error, Result};

use super::types::TraitFormat;

/// A persona shipped with the binary.
#[derive(Debug, Clone, Copy)]
pub struct BundledPersona {
    pub name: &'static str,
    pub description: &'static str,
    pub preferred_model: &'static str,
    pub capabilities: &'static [(&'static str, &'static str)],
    pub instructions: &'static str,
}

const RUBY: BundledPersona = BundledPersona {
    name: "Ruby",
    description: "Personal assistant for scheduling, file organization and everyday questions",
    preferred_model: "gpt-4o-mini",
    capabilities: &[
        ("schedule_management", "Manage calendars, appointments, and reminders"),
        ("file_organization", "Organize, search, and manage files and folders"),
        ("task_automation", "Create and execute automated workflows"),
        ("system_monitoring", "Monitor system resources and performance"),
        ("general_assistance", "Provide helpful information and support"),
    ],
    instructions: include_str!("../../config/instructions/ruby.md"),
};

const BUNDLED: &[BundledPersona] = &[RUBY];

impl BundledPersona {
    /// File name used under the instructions directory
    pub fn file_name(&self) -> String {
        format!("{}.md", self.name.to_lowercase())
    }

    pub fn settings(&self) -> AssistantSettings {
        AssistantSettings {
            name: self.name.to_string(),
            description: self.description.to_string(),
            preferred_model: Some(self.preferred_model.to_string()),
            // Relative, so it resolves against storage.instructions_dir
            instructions_file: Some(self.file_name()),
            instructions: None,
            trait_format: TraitFormat::Heuristic,
            capabilities: self
                .capabilities
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Default `[[assistants]]` entries.
pub fn bundled_assistants() -> Vec<AssistantSettings> {
    BUNDLED.iter().map(BundledPersona::settings).collect()
}

/// Look up a bundled persona by case-insensitive name.
pub fn bundled(name: &str) -> Option<&'static BundledPersona> {
    BUNDLED.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

pub fn bundled_personas() -> &'static [BundledPersona] {
    BUNDLED
}

/// Write a bundled persona's instructions into `dir`.
pub fn install_instructions(name: &str, dir: &Path, force: bool) -> Result<PathBuf> {
    let persona = bundled(name).ok_or_else(|| Error::AssistantNotFound {
        name: name.to_string(),
        available: BUNDLED.iter().map(|p| p.name.to_lowercase()).collect(),
    })?;

    let path = dir.join(persona.file_name());
    if path.exists() && !force {
        return Err(Error::file_operation(
            &path,
            "instructions already installed (use --force to overwrite)",
        ));
    }

    fs::create_dir_all(dir).map_err(|e| Error::IoWrite {
        path: dir.to_path_buf(),
        source: e,
    })?;
    fs::write(&path, persona.instructions).map_err(|e| Error::IoWrite {
        path: path.clone(),
        source: e,
    })?;

    info!(persona = persona.name, path = %path.display(), "Installed instructions");
    Ok(path)
}
