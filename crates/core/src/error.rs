//! Error types for AgentGate.

use thiserror::Error;

/// Result type alias using AgentGate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for AgentGate.
///
/// Governance denials (policy deny, budget exceeded, rate limit hit) are
/// NOT errors; they are ordinary `allowed = false` results. This enum covers
/// infrastructure failures, configuration faults, and approval state-machine
/// violations that callers need to tell apart.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Infrastructure Errors
    // =========================================================================
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Store error: {0}")]
    Store(String),

    // =========================================================================
    // Approval State-Machine Violations
    // =========================================================================
    #[error("Approval request not found: {0}")]
    ApprovalNotFound(String),

    #[error("Approval request expired: {0}")]
    ApprovalExpired(String),

    #[error("Approval request {id} already decided: {status}")]
    AlreadyDecided { id: String, status: String },

    #[error("Self-approval not allowed for requester {0}")]
    SelfApprovalNotAllowed(String),

    #[error("Approver {0} is not authorized to decide approvals")]
    UnauthorizedApprover(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a store-unavailable error.
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
