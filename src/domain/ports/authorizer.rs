//! Authorization port.

use async_trait::async_trait;

use crate::domain::models::CallerIdentity;

/// Decides whether a caller may use an agent network.
///
/// Consulted once per request, before admission.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn is_authorized(&self, caller: &CallerIdentity, agent_name: &str) -> bool;
}

/// Authorizer that permits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllAuthorizer;

#[async_trait]
impl Authorizer for AllowAllAuthorizer {
    async fn is_authorized(&self, _caller: &CallerIdentity, _agent_name: &str) -> bool {
        true
    }
}
