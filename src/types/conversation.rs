//! Conversation context supplied by callers

use serde::{Deserialize, Serialize};

/// One exchange between the user and an assistant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub assistant: String,
}

#[cfg(test)]
impl ConversationTurn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

/// Per-request context; never persisted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Prior turns, oldest first
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,

    /// Any other caller-supplied fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ConversationContext {
    #[cfg(test)]
    pub fn with_history(history: Vec<ConversationTurn>) -> Self {
        Self {
            conversation_history: history,
            extra: serde_json::Map::new(),
        }
    }

    /// The last `n` turns, oldest first
    pub fn recent(&self, n: usize) -> &[ConversationTurn] {
        let len = self.conversation_history.len();
        &self.conversation_history[len.saturating_sub(n)..]
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.extra.insert(key.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_keeps_latest_turns() {
        let ctx = ConversationContext::with_history(
            (0..5)
                .map(|i| ConversationTurn::new(format!("q{}", i), format!("a{}", i)))
                .collect(),
        );
        let recent = ctx.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].user, "q2");
        assert_eq!(recent[2].assistant, "a4");
    }

    #[test]
    fn test_recent_short_history() {
        let ctx = ConversationContext::with_history(vec![ConversationTurn::new("hi", "hello")]);
        assert_eq!(ctx.recent(3).len(), 1);
        assert!(ConversationContext::default().recent(3).is_empty());
    }

    #[test]
    fn test_extra_fields_round_through_json() {
        let ctx: ConversationContext = serde_json::from_value(serde_json::json!({
            "conversation_history": [{"user": "hi", "assistant": "hey"}],
            "task_execution": true
        }))
        .unwrap();
        assert_eq!(ctx.conversation_history.len(), 1);
        assert_eq!(ctx.extra["task_execution"], serde_json::json!(true));
    }
}
