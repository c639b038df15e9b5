//! Builds candidate registry snapshots from disk.
//!
//! A load never touches the store. It reads the manifest, parses the agent
//! networks it lists, validates the whole candidate and hands it back; the
//! caller decides whether to publish. Networks untouched by the trigger are
//! shared with the previous snapshot instead of being parsed again.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::domain::errors::{RegistryError, RegistryResult};
use crate::domain::models::{AgentNetwork, ConfigSnapshot, Manifest, RegisteredAgent, ReloadTrigger};
use crate::infrastructure::registry_format;

#[derive(Debug, Clone)]
pub struct RegistryLoader {
    manifest_path: PathBuf,
    base_dir: PathBuf,
}

impl RegistryLoader {
    /// Create a loader for the manifest at `manifest_path`.
    ///
    /// Definition paths are resolved against the manifest's canonical directory
    /// so they compare equal to the paths the filesystem watcher reports.
    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        let manifest_path = manifest_path.into();
        let parent = manifest_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let base_dir = std::fs::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf());
        let manifest_path = manifest_path
            .file_name()
            .map_or_else(|| manifest_path.clone(), |name| base_dir.join(name));

        Self {
            manifest_path,
            base_dir,
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Build the snapshot that follows `previous`.
    ///
    /// The result carries version `previous.version + 1` and has passed every
    /// validation check. On error nothing is returned, so a broken edit can
    /// never replace a good snapshot.
    #[instrument(skip(self, trigger, previous), fields(reason = %trigger.reason, from_version = previous.version))]
    pub fn load(
        &self,
        trigger: &ReloadTrigger,
        previous: &ConfigSnapshot,
    ) -> RegistryResult<ConfigSnapshot> {
        if !self.manifest_path.is_file() {
            return Err(RegistryError::ManifestMissing(self.manifest_path.clone()));
        }

        let manifest: Manifest = registry_format::read_document(&self.manifest_path)?;
        let entries = manifest
            .served_agents(&self.base_dir)
            .map_err(|reason| RegistryError::invalid(&self.manifest_path, reason))?;

        let mut agents = Vec::with_capacity(entries.len());
        let (mut reused, mut parsed) = (0usize, 0usize);
        for entry in entries {
            let network = match previous.get(&entry.name) {
                Some(existing) if existing.source == entry.path && !trigger.affects(&entry.path) => {
                    reused += 1;
                    Arc::clone(&existing.network)
                }
                _ => {
                    parsed += 1;
                    Arc::new(load_network(&entry.path)?)
                }
            };
            agents.push(RegisteredAgent {
                name: entry.name,
                source: entry.path,
                public: entry.public,
                network,
            });
        }

        let snapshot = ConfigSnapshot::new(previous.version + 1, agents);
        if let Err((agent, reason)) = snapshot.validate_references() {
            return Err(RegistryError::invalid(&agent.source, reason));
        }

        info!(
            version = snapshot.version,
            agents = snapshot.len(),
            reused,
            parsed,
            "Registry candidate loaded"
        );
        Ok(snapshot)
    }
}

fn load_network(path: &Path) -> RegistryResult<AgentNetwork> {
    if !path.is_file() {
        return Err(RegistryError::invalid(
            path,
            "listed in the manifest but the file does not exist",
        ));
    }
    let network: AgentNetwork = registry_format::read_document(path)?;
    network
        .validate()
        .map_err(|reason| RegistryError::invalid(path, reason))?;
    debug!(path = %path.display(), tools = network.tools.len(), "Parsed agent network");
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ChangeEvent, ChangeKind, ReloadReason};
    use std::fs;
    use tempfile::TempDir;

    const HELLO: &str = r#"
    {
        "tools": [
            {
                "name": "Announcer"
                "function": { "description": "Says hello" }
                "instructions": """Greet the user."""
                "tools": ["Synonymizer"]
            }
            { "name": "Synonymizer" }
        ]
    }
    "#;

    const MUSIC: &str = r#"{ "tools": [ { "name": "MusicNerdPro", "tools": ["/hello_world"] } ] }"#;

    fn registry(manifest: &str) -> (TempDir, RegistryLoader) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello_world.hocon"), HELLO).unwrap();
        fs::write(dir.path().join("music_nerd_pro.hocon"), MUSIC).unwrap();
        fs::write(dir.path().join("manifest.hocon"), manifest).unwrap();
        let loader = RegistryLoader::new(dir.path().join("manifest.hocon"));
        (dir, loader)
    }

    fn startup() -> ReloadTrigger {
        ReloadTrigger::full(ReloadReason::Startup)
    }

    #[test]
    fn test_initial_load() {
        let (_dir, loader) = registry(
            r#"{ "hello_world.hocon": true, "music_nerd_pro.hocon": { "public": false } }"#,
        );
        let snapshot = loader.load(&startup(), &ConfigSnapshot::empty()).unwrap();

        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.agent_names().collect::<Vec<_>>(), vec!["hello_world", "music_nerd_pro"]);
        let hello = snapshot.get("hello_world").unwrap();
        assert_eq!(hello.network.description(), Some("Says hello"));
        assert!(hello.public);
        assert!(!snapshot.get("music_nerd_pro").unwrap().public);
    }

    #[test]
    fn test_unserved_entries_are_skipped() {
        let (_dir, loader) =
            registry(r#"{ "hello_world.hocon": true, "music_nerd_pro.hocon": false }"#);
        let snapshot = loader.load(&startup(), &ConfigSnapshot::empty()).unwrap();
        assert!(snapshot.contains("hello_world"));
        assert!(!snapshot.contains("music_nerd_pro"));
    }

    #[test]
    fn test_unaffected_networks_are_shared() {
        let (dir, loader) =
            registry(r#"{ "hello_world.hocon": true, "music_nerd_pro.hocon": true }"#);
        let first = loader.load(&startup(), &ConfigSnapshot::empty()).unwrap();

        let changed = loader.base_dir().join("music_nerd_pro.hocon");
        fs::write(
            dir.path().join("music_nerd_pro.hocon"),
            r#"{ "tools": [ { "name": "MusicNerdPro2" } ] }"#,
        )
        .unwrap();
        let trigger = ReloadTrigger::from_events([ChangeEvent::new(&changed, ChangeKind::Modified)]);
        let second = loader.load(&trigger, &first).unwrap();

        assert_eq!(second.version, 2);
        assert!(Arc::ptr_eq(
            &first.get("hello_world").unwrap().network,
            &second.get("hello_world").unwrap().network
        ));
        assert_eq!(
            second.get("music_nerd_pro").unwrap().network.tools[0].name,
            "MusicNerdPro2"
        );
    }

    #[test]
    fn test_full_reload_reparses_everything() {
        let (_dir, loader) = registry(r#"{ "hello_world.hocon": true }"#);
        let first = loader.load(&startup(), &ConfigSnapshot::empty()).unwrap();
        let second = loader
            .load(&ReloadTrigger::full(ReloadReason::Manual), &first)
            .unwrap();
        assert!(!Arc::ptr_eq(
            &first.get("hello_world").unwrap().network,
            &second.get("hello_world").unwrap().network
        ));
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let loader = RegistryLoader::new(dir.path().join("manifest.hocon"));
        assert!(matches!(
            loader.load(&startup(), &ConfigSnapshot::empty()),
            Err(RegistryError::ManifestMissing(_))
        ));
    }

    #[test]
    fn test_invalid_network_rejects_candidate() {
        let (dir, loader) = registry(r#"{ "hello_world.hocon": true }"#);
        fs::write(dir.path().join("hello_world.hocon"), r#"{ "tools": [ ] }"#).unwrap();

        let err = loader.load(&startup(), &ConfigSnapshot::empty()).unwrap_err();
        match err {
            RegistryError::InvalidDefinition { path, reason } => {
                assert!(path.ends_with("hello_world.hocon"));
                assert!(reason.contains("at least one tool"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_listed_file_must_exist() {
        let (_dir, loader) = registry(r#"{ "hello_world.hocon": true, "ghost.hocon": true }"#);
        assert!(matches!(
            loader.load(&startup(), &ConfigSnapshot::empty()),
            Err(RegistryError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn test_dangling_network_reference() {
        // music_nerd_pro points at /hello_world, which is not served
        let (_dir, loader) =
            registry(r#"{ "hello_world.hocon": false, "music_nerd_pro.hocon": true }"#);
        let err = loader.load(&startup(), &ConfigSnapshot::empty()).unwrap_err();
        assert!(err.to_string().contains("/hello_world"));
    }
}
