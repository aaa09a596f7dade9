//! Instruction sources.
//!
//! Instructions are read through on every message so edits to the
//! file take effect without a restart.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{Error, Result};

#[async_trait]
pub trait InstructionSource: Send + Sync {
    /// Where the instructions live, for status reports.
    fn location(&self) -> Option<String>;

    async fn load(&self) -> Result<String>;
}

/// Markdown file on disk.
pub struct FileInstructionSource {
    path: PathBuf,
}

impl FileInstructionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl InstructionSource for FileInstructionSource {
    fn location(&self) -> Option<String> {
        Some(self.path.display().to_string())
    }

    async fn load(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::InstructionsUnavailable {
                path: self.path.clone(),
                source: e,
            })
    }
}

/// Text embedded in configuration.
pub struct InlineInstructionSource {
    text: String,
}

impl InlineInstructionSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl InstructionSource for InlineInstructionSource {
    fn location(&self) -> Option<String> {
        None
    }

    async fn load(&self) -> Result<String> {
        Ok(self.text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_source_reads_latest_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("opal.md");
        std::fs::write(&path, "first").unwrap();

        let source = FileInstructionSource::new(&path);
        assert_eq!(source.load().await.unwrap(), "first");

        std::fs::write(&path, "second").unwrap();
        assert_eq!(source.load().await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let source = FileInstructionSource::new("/nonexistent/crystal/opal.md");
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, Error::InstructionsUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_inline_source() {
        let source = InlineInstructionSource::new("Be brief.");
        assert_eq!(source.load().await.unwrap(), "Be brief.");
        assert!(source.location().is_none());
    }
}
