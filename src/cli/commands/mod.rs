//! Command handlers, one module per subcommand.

pub mod chat;
pub mod config;
pub mod validate;
pub mod watch;

use std::sync::Arc;

use crate::application::AgentServer;
use crate::domain::models::Config;
use crate::domain::ports::AllowAllAuthorizer;
use crate::infrastructure::engine::EchoEngine;

/// Server core backed by the demo engine and an allow-all authorizer.
pub(crate) fn demo_server(config: &Config) -> AgentServer {
    AgentServer::new(config, Arc::new(EchoEngine::new()), Arc::new(AllowAllAuthorizer))
}
