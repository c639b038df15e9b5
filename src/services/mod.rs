//! Core services of the agent server.
//!
//! - `registry_watcher`, `debouncer`, `registry_loader`: turn filesystem
//!   changes into validated registry snapshots
//! - `config_store`: versioned, atomically swapped snapshots
//! - `admission_controller`: capacity limit and drain lifecycle
//! - `streaming_bridge`: per-request producer/consumer channel
//! - `response_shaper`: published form of chat messages
//! - `diagnostics`: periodic structured reports

pub mod admission_controller;
pub mod config_store;
pub mod debouncer;
pub mod diagnostics;
pub mod registry_loader;
pub mod registry_watcher;
pub mod response_shaper;
pub mod streaming_bridge;

pub use admission_controller::{AdmissionController, AdmissionPermit};
pub use config_store::{ConfigStore, MIN_RETAINED_VERSIONS};
pub use debouncer::Debouncer;
pub use diagnostics::{DiagnosticsReport, DiagnosticsReporter};
pub use registry_loader::RegistryLoader;
pub use registry_watcher::{EventCounts, RegistryWatcher, WatcherSettings};
pub use response_shaper::shape_message;
pub use streaming_bridge::{MessageReceiver, MessageSender};
