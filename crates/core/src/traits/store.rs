//! Backing-store traits.
//!
//! All mutation paths that concurrent invocations share are specified as
//! atomic operations on the store side. A read-then-write round trip from
//! the caller is a known race and is deliberately not expressible here.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ApprovalRequest, Budget};

/// Persistence for budget rows, keyed by `(agent_id, organization_id)`.
#[async_trait]
pub trait BudgetStore: Send + Sync {
    /// Load the budget row for an agent, if one is provisioned.
    async fn get(&self, agent_id: &str, organization_id: &str) -> Result<Option<Budget>>;

    /// Create or replace a budget row.
    async fn upsert(&self, budget: Budget) -> Result<()>;

    /// Atomically add `cost_usd` to the spend counters and bump the
    /// execution count. Must be a single read-modify-write on the store.
    async fn record_cost(
        &self,
        agent_id: &str,
        organization_id: &str,
        cost_usd: f64,
    ) -> Result<()>;
}

/// Keyed counters for rate-limit windows.
#[async_trait]
pub trait RateCounterStore: Send + Sync {
    /// Current count for a key (0 when absent or expired).
    async fn get_count(&self, key: &str) -> Result<u64>;

    /// Atomically increment a key, creating it with the given TTL,
    /// and return the new count.
    async fn incr(&self, key: &str, ttl_seconds: u64) -> Result<u64>;
}

/// Persistence for approval requests, keyed by request id.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    async fn insert(&self, request: ApprovalRequest) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<ApprovalRequest>>;

    /// Write back a mutated request iff the stored `version` still equals
    /// `request.version`; the store bumps the version on success. Returns
    /// `Ok(false)` when another writer got there first.
    async fn compare_and_update(&self, request: ApprovalRequest) -> Result<bool>;

    async fn list_pending(&self) -> Result<Vec<ApprovalRequest>>;
}
