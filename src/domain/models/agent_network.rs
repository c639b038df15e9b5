//! Agent network definitions.
//!
//! An agent network file describes a set of cooperating agents ("tools").
//! The first tool is the front man that receives user input:
//!
//! ```text
//! {
//!     "llm_config": { "model_name": "gpt-4o" },
//!     "tools": [
//!         {
//!             "name": "MusicNerdPro",
//!             "function": { "description": "Answers questions about music" },
//!             "instructions": "You are a music expert...",
//!             "tools": ["Accountant", "/music_history"]
//!         },
//!         { "name": "Accountant", "class": "accounting.Accountant" }
//!     ]
//! }
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A parsed agent network file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentNetwork {
    #[serde(default)]
    pub llm_config: Option<Value>,

    #[serde(default)]
    pub commondefs: Option<Value>,

    #[serde(default)]
    pub metadata: Option<Value>,

    #[serde(default)]
    pub tools: Vec<AgentSpec>,
}

/// A single agent (tool) inside a network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,

    /// Function description advertised to callers and to other agents.
    #[serde(default)]
    pub function: Option<Value>,

    #[serde(default)]
    pub instructions: Option<String>,

    #[serde(default)]
    pub command: Option<String>,

    /// Coded tool implementation, if this agent is not LLM-driven.
    #[serde(default)]
    pub class: Option<String>,

    /// Names of the agents this agent may call.
    #[serde(default)]
    pub tools: Vec<String>,

    #[serde(default)]
    pub llm_config: Option<Value>,
}

/// How a `tools` entry refers to another agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolReference<'a> {
    /// Another tool in the same network.
    Local(&'a str),
    /// Another agent network served by the same registry (`/name`).
    Network(&'a str),
    /// An agent network on a remote server; not resolved locally.
    Remote(&'a str),
}

impl<'a> ToolReference<'a> {
    pub fn parse(reference: &'a str) -> Self {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            Self::Remote(reference)
        } else if let Some(name) = reference.strip_prefix('/') {
            Self::Network(name)
        } else {
            Self::Local(reference)
        }
    }
}

impl AgentNetwork {
    /// The agent that receives user input.
    pub fn front_man(&self) -> Option<&AgentSpec> {
        self.tools.first()
    }

    /// Human-readable description of the network, taken from the front man's function.
    pub fn description(&self) -> Option<&str> {
        self.front_man()?
            .function
            .as_ref()?
            .get("description")?
            .as_str()
    }

    pub fn tool(&self, name: &str) -> Option<&AgentSpec> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    /// Names of other registry networks this network calls (`/name` references).
    pub fn network_references(&self) -> impl Iterator<Item = &str> {
        self.tools
            .iter()
            .flat_map(|tool| tool.tools.iter())
            .filter_map(|reference| match ToolReference::parse(reference) {
                ToolReference::Network(name) => Some(name),
                _ => None,
            })
    }

    /// Check the network's internal consistency.
    ///
    /// Cross-network references are checked by the snapshot, which knows
    /// every network being published alongside this one.
    pub fn validate(&self) -> Result<(), String> {
        if self.tools.is_empty() {
            return Err("network must define at least one tool".to_string());
        }

        let mut names = HashSet::new();
        for tool in &self.tools {
            if tool.name.trim().is_empty() {
                return Err("tool name cannot be empty".to_string());
            }
            if !names.insert(tool.name.as_str()) {
                return Err(format!("duplicate tool name '{}'", tool.name));
            }
        }

        for tool in &self.tools {
            for reference in &tool.tools {
                if let ToolReference::Local(name) = ToolReference::parse(reference) {
                    if !names.contains(name) {
                        return Err(format!(
                            "tool '{}' references unknown tool '{name}'",
                            tool.name
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(name: &str, tools: &[&str]) -> AgentSpec {
        AgentSpec {
            name: name.to_string(),
            function: None,
            instructions: None,
            command: None,
            class: None,
            tools: tools.iter().map(|t| (*t).to_string()).collect(),
            llm_config: None,
        }
    }

    fn network(tools: Vec<AgentSpec>) -> AgentNetwork {
        AgentNetwork {
            llm_config: None,
            commondefs: None,
            metadata: None,
            tools,
        }
    }

    #[test]
    fn test_tool_reference_parse() {
        assert_eq!(ToolReference::parse("Helper"), ToolReference::Local("Helper"));
        assert_eq!(
            ToolReference::parse("/math_guy"),
            ToolReference::Network("math_guy")
        );
        assert_eq!(
            ToolReference::parse("https://example.com/agent"),
            ToolReference::Remote("https://example.com/agent")
        );
    }

    #[test]
    fn test_validate_ok() {
        let net = network(vec![
            spec("Front", &["Helper", "/other", "http://remote/x"]),
            spec("Helper", &[]),
        ]);
        assert!(net.validate().is_ok());
        assert_eq!(net.front_man().map(|t| t.name.as_str()), Some("Front"));
        assert_eq!(net.network_references().collect::<Vec<_>>(), vec!["other"]);
    }

    #[test]
    fn test_validate_rejects_empty_and_duplicates() {
        assert!(network(vec![]).validate().is_err());

        let err = network(vec![spec("A", &[]), spec("A", &[])])
            .validate()
            .unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn test_validate_rejects_unknown_local_tool() {
        let err = network(vec![spec("Front", &["Missing"])])
            .validate()
            .unwrap_err();
        assert!(err.contains("Missing"));
    }

    #[test]
    fn test_description_from_front_man() {
        let mut front = spec("Front", &[]);
        front.function = Some(json!({ "description": "Answers music questions" }));
        let net = network(vec![front]);
        assert_eq!(net.description(), Some("Answers music questions"));
    }
}
