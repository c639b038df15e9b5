//! Immutable, versioned registry snapshots.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::agent_network::AgentNetwork;

/// An agent network as published in a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredAgent {
    pub name: String,
    /// Definition file the network was parsed from.
    pub source: PathBuf,
    pub public: bool,
    pub network: Arc<AgentNetwork>,
}

/// A complete, validated view of the registry.
///
/// Snapshots are never mutated after publication; readers share them through
/// `Arc` without locking.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub version: u64,
    pub manifest: BTreeMap<String, RegisteredAgent>,
    pub loaded_at: DateTime<Utc>,
}

/// Lightweight description of a snapshot for logs and CLI output.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub version: u64,
    pub agents: Vec<String>,
    pub loaded_at: DateTime<Utc>,
}

impl ConfigSnapshot {
    /// The version-0 snapshot the store starts with: no agents.
    pub fn empty() -> Self {
        Self {
            version: 0,
            manifest: BTreeMap::new(),
            loaded_at: Utc::now(),
        }
    }

    pub fn new(version: u64, agents: impl IntoIterator<Item = RegisteredAgent>) -> Self {
        Self {
            version,
            manifest: agents
                .into_iter()
                .map(|agent| (agent.name.clone(), agent))
                .collect(),
            loaded_at: Utc::now(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredAgent> {
        self.manifest.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.manifest.contains_key(name)
    }

    pub fn agent_names(&self) -> impl Iterator<Item = &str> {
        self.manifest.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.manifest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }

    /// Check that every `/name` reference points at a network in this snapshot.
    ///
    /// Returns the offending agent and a reason on failure.
    pub fn validate_references(&self) -> Result<(), (&RegisteredAgent, String)> {
        for agent in self.manifest.values() {
            for reference in agent.network.network_references() {
                if !self.manifest.contains_key(reference) {
                    return Err((
                        agent,
                        format!("references unknown agent network '/{reference}'"),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            version: self.version,
            agents: self.manifest.keys().cloned().collect(),
            loaded_at: self.loaded_at,
        }
    }
}
