//! External collaborator traits consumed by the governance gate.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ApprovalRequest;

/// Invocation-history lookups used to populate `TriggerContext`.
#[async_trait]
pub trait InvocationHistory: Send + Sync {
    /// Invocations by this agent (optionally scoped to a user) within the
    /// trailing window.
    async fn invocation_count(
        &self,
        agent_id: &str,
        user_id: Option<&str>,
        organization_id: &str,
        window_seconds: u64,
    ) -> Result<u64>;

    /// Whether this is the first ever invocation of the agent.
    async fn is_first_invocation(
        &self,
        agent_id: &str,
        user_id: Option<&str>,
        organization_id: &str,
    ) -> Result<bool>;
}

/// Confirms an approver may decide approvals for an organization.
#[async_trait]
pub trait ApproverAuthorizer: Send + Sync {
    async fn can_decide(&self, approver_id: &str, organization_id: &str) -> Result<bool>;
}

/// Fire-and-forget notification of newly created approval requests.
///
/// Failures are logged by the caller and must never block or fail the
/// governance gate.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_approval_requested(&self, request: &ApprovalRequest) -> Result<()>;
}
