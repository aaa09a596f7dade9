//! Model identifiers
//!
//! A model name is classified once, when the routing policy is built,
//! instead of being re-inspected at every call site.

use std::fmt;

use serde::{Serialize, Serializer};

/// Where a model runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// On-host model server
    Local,
    /// Hosted API
    Remote,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Local => write!(f, "local"),
            ModelKind::Remote => write!(f, "remote"),
        }
    }
}

/// A classified model identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelId {
    /// Served by the local backend ("name:tag")
    Local(String),
    /// Served by the remote API
    Remote(String),
    /// Matches neither naming convention
    Unclassified(String),
}

impl ModelId {
    /// Classify a raw model name
    ///
    /// An explicit `local:` or `remote:` prefix always wins. Otherwise a
    /// name containing `:` is local and a name starting with one of
    /// `remote_prefixes` is remote.
    pub fn classify(raw: &str, remote_prefixes: &[String]) -> Self {
        let raw = raw.trim();

        if let Some(name) = raw.strip_prefix("local:") {
            return ModelId::Local(name.to_string());
        }
        if let Some(name) = raw.strip_prefix("remote:") {
            return ModelId::Remote(name.to_string());
        }
        if raw.contains(':') {
            return ModelId::Local(raw.to_string());
        }

        let lower = raw.to_lowercase();
        if remote_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && lower.starts_with(&prefix.to_lowercase()))
        {
            return ModelId::Remote(raw.to_string());
        }

        ModelId::Unclassified(raw.to_string())
    }

    /// The bare model name sent to a backend
    pub fn name(&self) -> &str {
        match self {
            ModelId::Local(name) | ModelId::Remote(name) | ModelId::Unclassified(name) => name,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ModelId::Local(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ModelId::Remote(_))
    }

    /// Promote an unclassified name to local when the local server has it
    pub fn reconcile(self, available_local: &[String]) -> Self {
        match self {
            ModelId::Unclassified(name) if available_local.iter().any(|m| m == &name) => {
                ModelId::Local(name)
            }
            other => other,
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for ModelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> Vec<String> {
        vec!["gpt-".to_string(), "o1".to_string()]
    }

    #[test]
    fn test_tagged_name_is_local() {
        assert_eq!(
            ModelId::classify("llama3.1:8b", &prefixes()),
            ModelId::Local("llama3.1:8b".to_string())
        );
    }

    #[test]
    fn test_prefixed_name_is_remote() {
        assert_eq!(
            ModelId::classify("gpt-4o-mini", &prefixes()),
            ModelId::Remote("gpt-4o-mini".to_string())
        );
        assert!(ModelId::classify("O1-preview", &prefixes()).is_remote());
    }

    #[test]
    fn test_explicit_prefix_wins() {
        assert_eq!(
            ModelId::classify("local:mistral", &prefixes()),
            ModelId::Local("mistral".to_string())
        );
        assert_eq!(
            ModelId::classify("remote:claude-3", &prefixes()),
            ModelId::Remote("claude-3".to_string())
        );
    }

    #[test]
    fn test_unknown_name_is_unclassified() {
        let id = ModelId::classify("mistral", &prefixes());
        assert_eq!(id, ModelId::Unclassified("mistral".to_string()));
        assert!(!id.is_local() && !id.is_remote());
    }

    #[test]
    fn test_reconcile_with_available_list() {
        let available = vec!["mistral".to_string()];
        assert!(ModelId::Unclassified("mistral".to_string())
            .reconcile(&available)
            .is_local());
        assert!(!ModelId::Unclassified("phi".to_string())
            .reconcile(&available)
            .is_local());
        assert!(ModelId::Remote("gpt-4".to_string())
            .reconcile(&available)
            .is_remote());
    }
}
