//! Outgoing message filter port.

use crate::domain::models::{ChatFilter, ChatMessage, ChatMessageType};

/// Pass/fail predicate applied to each message before it is shaped and sent.
pub trait MessageFilter: Send + Sync {
    fn allows(&self, message: &ChatMessage) -> bool;
}

impl MessageFilter for ChatFilter {
    fn allows(&self, message: &ChatMessage) -> bool {
        match self {
            Self::Maximal => true,
            Self::Minimal => matches!(
                message.message_type,
                ChatMessageType::Ai | ChatMessageType::AgentFramework
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_filter_passes_final_answers_only() {
        let filter = ChatFilter::Minimal;
        assert!(filter.allows(&ChatMessage::ai("answer")));
        assert!(filter.allows(&ChatMessage::new(
            ChatMessageType::AgentFramework,
            "answer"
        )));
        assert!(!filter.allows(&ChatMessage::progress("thinking")));
        assert!(!filter.allows(&ChatMessage::new(ChatMessageType::AgentToolResult, "x")));
    }

    #[test]
    fn test_maximal_filter_passes_everything() {
        assert!(ChatFilter::Maximal.allows(&ChatMessage::progress("thinking")));
    }
}
