//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces of the collaborators the core consults
//! but does not implement:
//! - AgentEngine: runs an agent network and produces chat messages
//! - MessageSink: producer side of a streaming bridge, as seen by an engine
//! - Authorizer: per-request allow/deny decision
//! - MessageFilter: pass/fail predicate applied to outgoing messages

pub mod agent_engine;
pub mod authorizer;
pub mod message_filter;

pub use agent_engine::{AgentEngine, EngineRequest, MessageSink};
pub use authorizer::{AllowAllAuthorizer, Authorizer};
pub use message_filter::MessageFilter;
