//! Versioned store of published registry snapshots.
//!
//! Readers get an `Arc` to a complete snapshot and never hold the lock while
//! using it. Publishing swaps the current `Arc` under a short write lock, so
//! it is safe (and non-blocking in practice) from the watcher's background
//! tasks. The store keeps the current snapshot plus a bounded history so that
//! requests pinned just before a reload can still resolve their version.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::domain::errors::{RegistryError, RegistryResult};
use crate::domain::models::ConfigSnapshot;

/// Fewest snapshots retained: the current one and its predecessor.
pub const MIN_RETAINED_VERSIONS: usize = 2;

#[derive(Debug)]
struct StoreInner {
    current: Arc<ConfigSnapshot>,
    /// Older snapshots, oldest first.
    history: VecDeque<Arc<ConfigSnapshot>>,
}

/// Holds the active snapshot and a short history of its predecessors.
#[derive(Debug)]
pub struct ConfigStore {
    inner: RwLock<StoreInner>,
    retained_versions: usize,
    version_tx: watch::Sender<u64>,
}

impl ConfigStore {
    /// Create a store holding the empty version-0 snapshot.
    pub fn new(retained_versions: usize) -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            inner: RwLock::new(StoreInner {
                current: Arc::new(ConfigSnapshot::empty()),
                history: VecDeque::new(),
            }),
            retained_versions: retained_versions.max(MIN_RETAINED_VERSIONS),
            version_tx,
        }
    }

    /// Publish a snapshot if it is newer than the current one.
    pub fn publish(&self, snapshot: ConfigSnapshot) -> RegistryResult<Arc<ConfigSnapshot>> {
        let snapshot = Arc::new(snapshot);
        {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            let current = inner.current.version;
            if snapshot.version <= current {
                return Err(RegistryError::StaleVersion {
                    offered: snapshot.version,
                    current,
                });
            }

            let previous = std::mem::replace(&mut inner.current, Arc::clone(&snapshot));
            inner.history.push_back(previous);
            while inner.history.len() + 1 > self.retained_versions {
                if let Some(retired) = inner.history.pop_front() {
                    debug!(version = retired.version, "Retired registry snapshot");
                }
            }
        }

        self.version_tx.send_replace(snapshot.version);
        info!(
            version = snapshot.version,
            agents = snapshot.len(),
            "Published registry snapshot"
        );
        Ok(snapshot)
    }

    /// The latest published snapshot, for pinning by new requests.
    pub fn current(&self) -> Arc<ConfigSnapshot> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&inner.current)
    }

    pub fn current_version(&self) -> u64 {
        self.current().version
    }

    /// Look up an exact version, if still retained.
    pub fn get(&self, version: u64) -> RegistryResult<Arc<ConfigSnapshot>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if inner.current.version == version {
            return Ok(Arc::clone(&inner.current));
        }
        inner
            .history
            .iter()
            .find(|snapshot| snapshot.version == version)
            .cloned()
            .ok_or(RegistryError::SnapshotRetired(version))
    }

    /// Versions currently retained, oldest first.
    pub fn retained(&self) -> Vec<u64> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .history
            .iter()
            .map(|snapshot| snapshot.version)
            .chain(std::iter::once(inner.current.version))
            .collect()
    }

    /// Watch published version numbers.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }

    /// Wait until a version at least `version` has been published.
    pub async fn wait_for_version(&self, version: u64) -> u64 {
        let mut rx = self.subscribe();
        let published = match rx.wait_for(|published| *published >= version).await {
            Ok(published) => *published,
            // The sender lives as long as `self`, so this only happens during teardown.
            Err(_) => self.current_version(),
        };
        published
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(MIN_RETAINED_VERSIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(version: u64) -> ConfigSnapshot {
        ConfigSnapshot::new(version, Vec::new())
    }

    #[test]
    fn test_starts_at_version_zero() {
        let store = ConfigStore::new(2);
        assert_eq!(store.current_version(), 0);
        assert!(store.current().is_empty());
    }

    #[test]
    fn test_publish_requires_newer_version() {
        let store = ConfigStore::new(2);
        store.publish(snapshot(1)).unwrap();

        let err = store.publish(snapshot(1)).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::StaleVersion {
                offered: 1,
                current: 1
            }
        ));
        assert!(store.publish(snapshot(0)).is_err());
        assert_eq!(store.current_version(), 1);
    }

    #[test]
    fn test_retains_previous_versions() {
        let store = ConfigStore::new(3);
        for version in 1..=5 {
            store.publish(snapshot(version)).unwrap();
        }

        assert_eq!(store.retained(), vec![3, 4, 5]);
        assert_eq!(store.get(5).unwrap().version, 5);
        assert_eq!(store.get(4).unwrap().version, 4);
        assert!(matches!(
            store.get(2).unwrap_err(),
            RegistryError::SnapshotRetired(2)
        ));
    }

    #[test]
    fn test_minimum_retention_keeps_predecessor() {
        let store = ConfigStore::new(0);
        store.publish(snapshot(1)).unwrap();
        store.publish(snapshot(2)).unwrap();
        assert_eq!(store.retained(), vec![1, 2]);
    }

    #[test]
    fn test_pinned_snapshot_survives_retirement() {
        let store = ConfigStore::new(2);
        store.publish(snapshot(1)).unwrap();
        let pinned = store.current();
        store.publish(snapshot(2)).unwrap();
        store.publish(snapshot(3)).unwrap();

        assert!(store.get(1).is_err());
        assert_eq!(pinned.version, 1);
    }

    #[tokio::test]
    async fn test_wait_for_version() {
        let store = Arc::new(ConfigStore::new(2));
        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.wait_for_version(2).await })
        };

        store.publish(snapshot(1)).unwrap();
        store.publish(snapshot(2)).unwrap();
        assert_eq!(waiter.await.unwrap(), 2);
    }
}
