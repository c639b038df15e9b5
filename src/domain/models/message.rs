//! Chat messages produced by agent engines and streamed to callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Internal message type tag. The external name is produced by the
/// response shaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatMessageType {
    Unknown,
    System,
    Human,
    Ai,
    Agent,
    AgentFramework,
    AgentToolResult,
    AgentProgress,
}

impl ChatMessageType {
    /// Canonical external name.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::System => "SYSTEM",
            Self::Human => "HUMAN",
            Self::Ai => "AI",
            Self::Agent => "AGENT",
            Self::AgentFramework => "AGENT_FRAMEWORK",
            Self::AgentToolResult => "AGENT_TOOL_RESULT",
            Self::AgentProgress => "AGENT_PROGRESS",
        }
    }
}

/// One hop in the chain of agents that produced a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub tool: String,
    #[serde(default)]
    pub instantiation_index: u32,
}

/// Conversation history of one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatHistory {
    pub origin: Vec<Origin>,
    pub messages: Vec<ChatMessage>,
}

/// Context a caller can hand back to continue a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatContext {
    pub chat_histories: Vec<ChatHistory>,
}

/// A message in its internal representation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub message_type: ChatMessageType,
    pub text: Option<String>,
    pub structure: Option<Value>,
    pub origin: Vec<Origin>,
    pub chat_context: Option<ChatContext>,
}

impl ChatMessage {
    pub fn new(message_type: ChatMessageType, text: impl Into<String>) -> Self {
        Self {
            message_type,
            text: Some(text.into()),
            structure: None,
            origin: Vec::new(),
            chat_context: None,
        }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self::new(ChatMessageType::Ai, text)
    }

    pub fn progress(text: impl Into<String>) -> Self {
        Self::new(ChatMessageType::AgentProgress, text)
    }

    #[must_use]
    pub fn with_origin(mut self, tool: impl Into<String>) -> Self {
        self.origin.push(Origin {
            tool: tool.into(),
            instantiation_index: 0,
        });
        self
    }

    #[must_use]
    pub fn with_context(mut self, chat_context: ChatContext) -> Self {
        self.chat_context = Some(chat_context);
        self
    }
}

/// A frame on the streaming bridge: data or the end-of-stream marker.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Data(ChatMessage),
    End,
}

/// Which messages a caller wants to see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatFilter {
    /// Only final-answer content.
    Minimal,
    /// Everything the agents emit, including progress and tool results.
    #[default]
    Maximal,
}

impl std::str::FromStr for ChatFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minimal" => Ok(Self::Minimal),
            "maximal" => Ok(Self::Maximal),
            other => Err(format!("unknown chat filter '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names() {
        assert_eq!(ChatMessageType::Ai.canonical_name(), "AI");
        assert_eq!(ChatMessageType::AgentToolResult.canonical_name(), "AGENT_TOOL_RESULT");
        assert_eq!(ChatMessageType::Unknown.canonical_name(), "UNKNOWN");
    }

    #[test]
    fn test_chat_filter_from_str() {
        assert_eq!("MINIMAL".parse::<ChatFilter>().unwrap(), ChatFilter::Minimal);
        assert_eq!("maximal".parse::<ChatFilter>().unwrap(), ChatFilter::Maximal);
        assert!("verbose".parse::<ChatFilter>().is_err());
    }
}
