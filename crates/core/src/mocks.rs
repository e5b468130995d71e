//! Mock implementations of core traits for testing.
//!
//! Shared by unit and integration tests across the workspace so every
//! crate exercises the same collaborator seams.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::{
    traits::{ApproverAuthorizer, BudgetStore, InvocationHistory, Notifier, RateCounterStore},
    types::{ApprovalRequest, Budget},
    Error, Result,
};

// =============================================================================
// Mock Invocation History
// =============================================================================

/// History provider returning fixed answers.
pub struct MockInvocationHistory {
    pub count: u64,
    pub first_invocation: bool,
}

impl MockInvocationHistory {
    pub fn new(count: u64, first_invocation: bool) -> Self {
        Self {
            count,
            first_invocation,
        }
    }
}

#[async_trait]
impl InvocationHistory for MockInvocationHistory {
    async fn invocation_count(
        &self,
        _agent_id: &str,
        _user_id: Option<&str>,
        _organization_id: &str,
        _window_seconds: u64,
    ) -> Result<u64> {
        Ok(self.count)
    }

    async fn is_first_invocation(
        &self,
        _agent_id: &str,
        _user_id: Option<&str>,
        _organization_id: &str,
    ) -> Result<bool> {
        Ok(self.first_invocation)
    }
}

// =============================================================================
// Mock Authorizers
// =============================================================================

/// Authorizer that lets everyone decide.
pub struct AllowAllAuthorizer;

#[async_trait]
impl ApproverAuthorizer for AllowAllAuthorizer {
    async fn can_decide(&self, _approver_id: &str, _organization_id: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Authorizer that only accepts the approver ids it was built with.
pub struct StaticAuthorizer {
    approvers: Vec<String>,
}

impl StaticAuthorizer {
    pub fn new(approvers: Vec<String>) -> Self {
        Self { approvers }
    }
}

#[async_trait]
impl ApproverAuthorizer for StaticAuthorizer {
    async fn can_decide(&self, approver_id: &str, _organization_id: &str) -> Result<bool> {
        Ok(self.approvers.iter().any(|a| a == approver_id))
    }
}

// =============================================================================
// Counting Notifier
// =============================================================================

/// Notifier that records how many requests it was told about.
#[derive(Default)]
pub struct CountingNotifier {
    sent: AtomicUsize,
    /// When set, every notification fails (to prove failures never
    /// propagate into the gate).
    pub fail: bool,
    last_request_id: Mutex<Option<String>>,
}

impl CountingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn last_request_id(&self) -> Option<String> {
        self.last_request_id.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn notify_approval_requested(&self, request: &ApprovalRequest) -> Result<()> {
        if self.fail {
            return Err(Error::internal("notification channel down"));
        }
        self.sent.fetch_add(1, Ordering::SeqCst);
        *self.last_request_id.lock().unwrap() = Some(request.id.clone());
        Ok(())
    }
}

// =============================================================================
// Failing Stores (infrastructure-outage paths)
// =============================================================================

/// Budget store that is always unreachable. The enforcer must fail closed.
pub struct FailingBudgetStore;

#[async_trait]
impl BudgetStore for FailingBudgetStore {
    async fn get(&self, _agent_id: &str, _organization_id: &str) -> Result<Option<Budget>> {
        Err(Error::store_unavailable("budget store unreachable"))
    }

    async fn upsert(&self, _budget: Budget) -> Result<()> {
        Err(Error::store_unavailable("budget store unreachable"))
    }

    async fn record_cost(
        &self,
        _agent_id: &str,
        _organization_id: &str,
        _cost_usd: f64,
    ) -> Result<()> {
        Err(Error::store_unavailable("budget store unreachable"))
    }
}

/// Rate counter store that is always unreachable. The limiter must fail open.
pub struct FailingRateCounterStore;

#[async_trait]
impl RateCounterStore for FailingRateCounterStore {
    async fn get_count(&self, _key: &str) -> Result<u64> {
        Err(Error::store_unavailable("counter store unreachable"))
    }

    async fn incr(&self, _key: &str, _ttl_seconds: u64) -> Result<u64> {
        Err(Error::store_unavailable("counter store unreachable"))
    }
}
