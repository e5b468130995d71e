//! In-memory store implementations using DashMap.
//!
//! DashMap entry references hold the shard lock for the duration of the
//! mutation, which gives every read-modify-write below the single-atomic-
//! operation semantics the store traits require.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use agentgate_core::{
    traits::{ApprovalStore, BudgetStore, RateCounterStore},
    types::{ApprovalRequest, ApprovalStatus, Budget},
    Error, Result,
};

// =============================================================================
// Budget Store
// =============================================================================

/// In-memory budget rows keyed by `(organization_id, agent_id)`.
#[derive(Default)]
pub struct InMemoryBudgetStore {
    budgets: DashMap<String, Budget>,
}

impl InMemoryBudgetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(agent_id: &str, organization_id: &str) -> String {
        format!("{}/{}", organization_id, agent_id)
    }

    pub fn len(&self) -> usize {
        self.budgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.budgets.is_empty()
    }
}

#[async_trait]
impl BudgetStore for InMemoryBudgetStore {
    async fn get(&self, agent_id: &str, organization_id: &str) -> Result<Option<Budget>> {
        Ok(self
            .budgets
            .get(&Self::key(agent_id, organization_id))
            .map(|b| b.clone()))
    }

    async fn upsert(&self, budget: Budget) -> Result<()> {
        let key = Self::key(&budget.agent_id, &budget.organization_id);
        self.budgets.insert(key, budget);
        Ok(())
    }

    async fn record_cost(
        &self,
        agent_id: &str,
        organization_id: &str,
        cost_usd: f64,
    ) -> Result<()> {
        // get_mut holds the shard lock: the increment is atomic.
        let mut entry = self
            .budgets
            .get_mut(&Self::key(agent_id, organization_id))
            .ok_or_else(|| {
                Error::store(format!(
                    "no budget row for agent {} in org {}",
                    agent_id, organization_id
                ))
            })?;

        entry.monthly_spent_usd += cost_usd;
        entry.daily_spent_usd += cost_usd;
        entry.monthly_execution_count += 1;

        tracing::debug!(
            agent_id = agent_id,
            cost_usd = cost_usd,
            monthly_spent = entry.monthly_spent_usd,
            "Recorded invocation cost"
        );

        Ok(())
    }
}

// =============================================================================
// Rate Counter Store
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct CounterEntry {
    count: u64,
    expires_at: i64,
}

/// In-memory windowed counters with TTL-based expiry.
#[derive(Default)]
pub struct InMemoryRateCounterStore {
    counters: DashMap<String, CounterEntry>,
}

impl InMemoryRateCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries. Optional housekeeping; reads already treat
    /// expired entries as absent.
    pub fn cleanup(&self) {
        let now = Utc::now().timestamp();
        self.counters.retain(|_, v| v.expires_at > now);
    }
}

#[async_trait]
impl RateCounterStore for InMemoryRateCounterStore {
    async fn get_count(&self, key: &str) -> Result<u64> {
        let now = Utc::now().timestamp();
        Ok(self
            .counters
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.count)
            .unwrap_or(0))
    }

    async fn incr(&self, key: &str, ttl_seconds: u64) -> Result<u64> {
        let now = Utc::now().timestamp();
        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert(CounterEntry {
                count: 0,
                expires_at: now + ttl_seconds as i64,
            });

        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = now + ttl_seconds as i64;
        }
        entry.count += 1;

        Ok(entry.count)
    }
}

// =============================================================================
// Approval Store
// =============================================================================

/// In-memory approval requests with optimistic versioning.
#[derive(Default)]
pub struct InMemoryApprovalStore {
    requests: DashMap<String, ApprovalRequest>,
}

impl InMemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn insert(&self, mut request: ApprovalRequest) -> Result<()> {
        if self.requests.contains_key(&request.id) {
            return Err(Error::store(format!(
                "approval request {} already exists",
                request.id
            )));
        }
        request.version = 0;
        self.requests.insert(request.id.clone(), request);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ApprovalRequest>> {
        Ok(self.requests.get(id).map(|r| r.clone()))
    }

    async fn compare_and_update(&self, request: ApprovalRequest) -> Result<bool> {
        let mut entry = self
            .requests
            .get_mut(&request.id)
            .ok_or_else(|| Error::store(format!("unknown approval request {}", request.id)))?;

        if entry.version != request.version {
            return Ok(false);
        }

        let next_version = entry.version + 1;
        *entry = request;
        entry.version = next_version;
        Ok(true)
    }

    async fn list_pending(&self) -> Result<Vec<ApprovalRequest>> {
        Ok(self
            .requests
            .iter()
            .filter(|r| r.status == ApprovalStatus::Pending)
            .map(|r| r.clone())
            .collect())
    }
}
