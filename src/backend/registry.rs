//! Local model registry
//!
//! In-memory list of models the local backend reported as installed.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use super::GenerationBackend;

/// Availability probe for local models
#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<Vec<String>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-probe the backend; a failing probe empties the list
    pub async fn refresh(&self, backend: Option<&Arc<dyn GenerationBackend>>) -> usize {
        let models = match backend {
            Some(backend) => match backend.list_models().await {
                Ok(models) => {
                    info!(backend = backend.name(), count = models.len(), "Local models discovered");
                    models
                }
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "Local model probe failed");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let count = models.len();
        *self.models.write() = models;
        count
    }

    /// Snapshot in the order the probe returned
    pub fn models(&self) -> Vec<String> {
        self.models.read().clone()
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.models.read().iter().any(|m| m == name)
    }

    #[cfg(test)]
    pub fn first(&self) -> Option<String> {
        self.models.read().first().cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }

    #[cfg(test)]
    pub fn set(&self, models: Vec<String>) {
        *self.models.write() = models;
    }
}
