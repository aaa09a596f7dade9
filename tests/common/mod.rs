//! Common test utilities and fixtures
//!
//! This module provides shared test infrastructure

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Variables that would let the host environment leak into a test run
const ISOLATED_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "CRYSTAL_CONFIG",
    "CRYSTAL_OPENAI_API_KEY",
    "CRYSTAL_OPENAI_ENABLED",
    "CRYSTAL_OLLAMA_ENABLED",
    "CRYSTAL_ALLOW_FILE_OPERATIONS",
    "CRYSTAL_ALLOWED_DIRECTORIES",
    "CRYSTAL_LOG_FILE",
    "CRYSTAL_LOG_LEVEL",
    "CRYSTAL_PORT",
    "CRYSTAL_HOST",
    "CRYSTAL_INSTRUCTIONS_DIR",
    "RUST_LOG",
];

/// A `crystal` command with a clean environment
pub fn crystal_cmd() -> Command {
    let mut cmd = Command::cargo_bin("crystal").unwrap();
    for var in ISOLATED_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Get the path to the test fixtures directory
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Get a path to a specific fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

/// Get the valid config fixture path
pub fn valid_config_fixture() -> PathBuf {
    fixture_path("valid_config.toml")
}

/// Get the invalid config fixture path
pub fn invalid_config_fixture() -> PathBuf {
    fixture_path("invalid_config.toml")
}

/// Temporary directory holding a config file and a sandbox directory
/// that file operations are allowed to touch
pub struct Sandbox {
    pub temp_dir: TempDir,
    pub config_path: PathBuf,
    pub root: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        Self::with_file_operations(true)
    }

    pub fn with_file_operations(enabled: bool) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("sandbox");
        fs::create_dir_all(&root).unwrap();

        let config_path = temp_dir.path().join("config.toml");
        let config = format!(
            r#"
[openai]
enabled = false

[ollama]
enabled = false

[files]
allow_file_operations = {enabled}
allowed_directories = ['{root}']
duplicate_check_enabled = true

[storage]
data_dir = '{data}'
instructions_dir = '{instructions}'

[logging]
level = "warn"
file = ""

[[assistants]]
name = "Ruby"
instructions = "You are Ruby."
"#,
            enabled = enabled,
            root = root.display(),
            data = temp_dir.path().join("data").display(),
            instructions = temp_dir.path().join("instructions").display(),
        );
        fs::write(&config_path, config).unwrap();

        Self {
            temp_dir,
            config_path,
            root,
        }
    }

    pub fn config(&self) -> &str {
        self.config_path.to_str().unwrap()
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}
