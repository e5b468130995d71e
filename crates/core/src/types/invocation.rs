use serde::{Deserialize, Serialize};

use super::principal::Principal;
use super::trigger::TriggerContext;

/// Full context of one external-agent invocation, handed to the
/// governance gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationContext {
    /// Who is invoking.
    pub principal: Principal,
    /// What is being invoked, with upstream history signals attached.
    pub trigger: TriggerContext,
}

impl InvocationContext {
    pub fn new(principal: Principal, trigger: TriggerContext) -> Self {
        Self { principal, trigger }
    }

    /// Identity held responsible for the invocation: the invoking user
    /// when known, otherwise the agent itself.
    pub fn requester_id(&self) -> &str {
        self.trigger
            .user_id
            .as_deref()
            .unwrap_or(&self.trigger.agent_id)
    }
}

/// The single decision integrators act on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateDecision {
    pub allowed: bool,
    pub reason: String,
    /// Set when the invocation is held for human approval.
    pub pending_approval_id: Option<String>,
    /// Advisory: budget consumption crossed the degradation threshold.
    pub degraded_mode: bool,
}

impl GateDecision {
    pub fn allowed(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            pending_approval_id: None,
            degraded_mode: false,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            pending_approval_id: None,
            degraded_mode: false,
        }
    }
}
