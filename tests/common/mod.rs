//! Common test utilities for integration tests
//!
//! Registry fixtures on disk and small polling helpers shared across the
//! integration test files.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use neurohost::domain::models::{AgentNetwork, AgentSpec, ConfigSnapshot, RegisteredAgent};

/// Generous upper bound for anything that waits on real filesystem events.
pub const FS_TIMEOUT: Duration = Duration::from_secs(10);

/// A registry directory with a manifest, removed when dropped.
pub struct TestRegistry {
    pub dir: TempDir,
}

impl TestRegistry {
    /// Create a registry serving `agents`, each with a single front man.
    pub fn with_agents(agents: &[&str]) -> Self {
        let registry = Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        };
        for agent in agents {
            registry.write_network(agent, &network_doc(&front_man_name(agent), &[]));
        }
        registry.write_manifest(agents);
        registry
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path().join("manifest.hocon")
    }

    /// Rewrite the manifest so it serves exactly `agents`.
    pub fn write_manifest(&self, agents: &[&str]) {
        let entries: Vec<String> = agents
            .iter()
            .map(|agent| format!("    \"{agent}.hocon\": true"))
            .collect();
        let body = format!("# served agent networks\n{{\n{}\n}}\n", entries.join(",\n"));
        std::fs::write(self.manifest_path(), body).expect("Failed to write manifest");
    }

    pub fn write_network(&self, agent: &str, body: &str) {
        std::fs::write(self.path().join(format!("{agent}.hocon")), body)
            .expect("Failed to write network");
    }

    pub fn remove_network(&self, agent: &str) {
        std::fs::remove_file(self.path().join(format!("{agent}.hocon")))
            .expect("Failed to remove network");
    }
}

/// Front man name used for `agent` in fixtures: `hello_world` becomes `HelloWorld`.
pub fn front_man_name(agent: &str) -> String {
    agent
        .split('_')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect()
}

/// HOCON document for a network whose front man calls `tools`.
pub fn network_doc(front_man: &str, tools: &[&str]) -> String {
    let listed: Vec<String> = tools.iter().map(|t| format!("\"{t}\"")).collect();
    let mut specs = vec![format!(
        "    {{ name: \"{front_man}\", function: {{ description: \"{front_man} answers\" }}, tools: [{}] }}",
        listed.join(", ")
    )];
    for tool in tools.iter().filter(|t| !t.starts_with('/')) {
        specs.push(format!("    {{ name: \"{tool}\", tools: [] }}"));
    }
    format!("{{\n  tools: [\n{}\n  ]\n}}\n", specs.join(",\n"))
}

/// In-memory snapshot with one single-tool network per name.
pub fn snapshot(version: u64, agents: &[&str]) -> ConfigSnapshot {
    ConfigSnapshot::new(
        version,
        agents.iter().map(|name| RegisteredAgent {
            name: (*name).to_string(),
            source: PathBuf::from(format!("/registry/{name}.hocon")),
            public: true,
            network: Arc::new(AgentNetwork {
                llm_config: None,
                commondefs: None,
                metadata: None,
                tools: vec![AgentSpec {
                    name: front_man_name(name),
                    function: None,
                    instructions: None,
                    command: None,
                    class: None,
                    tools: Vec::new(),
                    llm_config: None,
                }],
            }),
        }),
    )
}

/// Setup test logging
#[allow(dead_code)]
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Poll `predicate` every 20ms until it holds or `timeout` elapses.
pub async fn wait_for<F>(mut predicate: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    predicate()
}
