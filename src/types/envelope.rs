//! Response envelope returned for every routed message

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message used when a producer hands back nothing to say
pub const EMPTY_MESSAGE_FALLBACK: &str = "I apologize, but I don't have a response right now.";

/// Reply to a single request; `message` is never empty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub message: String,
    pub assistant: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub actions_taken: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub error: bool,
}

impl ResponseEnvelope {
    fn build(
        assistant: impl Into<String>,
        message: impl Into<String>,
        actions: Vec<String>,
        metadata: Map<String, Value>,
        error: bool,
    ) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = EMPTY_MESSAGE_FALLBACK.to_string();
        }
        Self {
            message,
            assistant: assistant.into(),
            timestamp: Utc::now(),
            actions_taken: actions,
            metadata,
            error,
        }
    }

    pub fn success(
        assistant: impl Into<String>,
        message: impl Into<String>,
        actions: Vec<String>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self::build(assistant, message, actions, metadata, false)
    }

    pub fn failure(
        assistant: impl Into<String>,
        message: impl Into<String>,
        actions: Vec<String>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self::build(assistant, message, actions, metadata, true)
    }

    /// Outer envelope stamped by the router
    pub fn routed(mut self, assistant: impl Into<String>) -> Self {
        self.assistant = assistant.into();
        self.timestamp = Utc::now();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_message_replaced() {
        let env = ResponseEnvelope::success("ruby", "   ", vec![], Map::new());
        assert_eq!(env.message, EMPTY_MESSAGE_FALLBACK);
        assert!(!env.error);
    }

    #[test]
    fn test_routed_preserves_inner_fields() {
        let mut metadata = Map::new();
        metadata.insert("model".to_string(), Value::from("llama3.1:8b"));
        let inner = ResponseEnvelope::success(
            "Ruby",
            "hello",
            vec!["message_processed".to_string()],
            metadata,
        );
        let before = inner.timestamp;

        let outer = inner.routed("ruby");
        assert_eq!(outer.assistant, "ruby");
        assert_eq!(outer.actions_taken, vec!["message_processed"]);
        assert_eq!(outer.metadata["model"], Value::from("llama3.1:8b"));
        assert!(outer.timestamp >= before);
    }

    #[test]
    fn test_failure_sets_flag() {
        let env = ResponseEnvelope::failure("system", "nope", vec![], Map::new());
        assert!(env.error);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["error"], Value::Bool(true));
        assert!(json["timestamp"].is_string());
    }
}
