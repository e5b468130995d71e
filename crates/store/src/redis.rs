//! Redis implementations of the counter and budget stores.
//!
//! Increments run server-side (INCR / INCRBYFLOAT), so concurrent gate
//! instances sharing one Redis cannot lose updates.

use async_trait::async_trait;
use chrono::Utc;
use redis::{AsyncCommands, Client};

use agentgate_core::{
    traits::{BudgetStore, RateCounterStore},
    types::Budget,
    Error, Result,
};

// =============================================================================
// Rate Counter Store
// =============================================================================

/// Redis-backed windowed counters.
pub struct RedisCounterStore {
    client: Client,
    prefix: String,
}

impl RedisCounterStore {
    pub fn new(url: &str, prefix: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| Error::store_unavailable(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            client,
            prefix: prefix.to_string(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::store_unavailable(format!("Redis connection error: {}", e)))
    }
}

#[async_trait]
impl RateCounterStore for RedisCounterStore {
    async fn get_count(&self, key: &str) -> Result<u64> {
        let mut conn = self.connection().await?;
        let count: Option<u64> = conn
            .get(self.key(key))
            .await
            .map_err(|e| Error::store(format!("Redis get error: {}", e)))?;
        Ok(count.unwrap_or(0))
    }

    async fn incr(&self, key: &str, ttl_seconds: u64) -> Result<u64> {
        let mut conn = self.connection().await?;
        let key = self.key(key);

        let count: u64 = conn
            .incr(&key, 1u64)
            .await
            .map_err(|e| Error::store(format!("Redis incr error: {}", e)))?;

        // First increment creates the key; attach the window TTL then.
        if count == 1 {
            let _: () = conn
                .expire(&key, ttl_seconds as i64)
                .await
                .map_err(|e| Error::store(format!("Redis expire error: {}", e)))?;
        }

        Ok(count)
    }
}

// =============================================================================
// Budget Store
// =============================================================================

/// Redis-backed budget rows.
///
/// Caps are stored as a JSON row; spend counters live in separate
/// period-suffixed keys (`{org}/{agent}:{YYYYMM}` etc.), so period
/// rollover happens by key change rather than an explicit reset job.
pub struct RedisBudgetStore {
    client: Client,
    prefix: String,
}

impl RedisBudgetStore {
    pub fn new(url: &str, prefix: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| Error::store_unavailable(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            client,
            prefix: prefix.to_string(),
        })
    }

    fn row_key(&self, agent_id: &str, organization_id: &str) -> String {
        format!("{}:budget:{}/{}", self.prefix, organization_id, agent_id)
    }

    fn monthly_key(&self, agent_id: &str, organization_id: &str) -> String {
        let period = Utc::now().format("%Y%m");
        format!(
            "{}:spent:{}/{}:{}",
            self.prefix, organization_id, agent_id, period
        )
    }

    fn daily_key(&self, agent_id: &str, organization_id: &str) -> String {
        let period = Utc::now().format("%Y%m%d");
        format!(
            "{}:spent:{}/{}:{}",
            self.prefix, organization_id, agent_id, period
        )
    }

    fn execs_key(&self, agent_id: &str, organization_id: &str) -> String {
        let period = Utc::now().format("%Y%m");
        format!(
            "{}:execs:{}/{}:{}",
            self.prefix, organization_id, agent_id, period
        )
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::store_unavailable(format!("Redis connection error: {}", e)))
    }
}

#[async_trait]
impl BudgetStore for RedisBudgetStore {
    async fn get(&self, agent_id: &str, organization_id: &str) -> Result<Option<Budget>> {
        let mut conn = self.connection().await?;

        let row: Option<String> = conn
            .get(self.row_key(agent_id, organization_id))
            .await
            .map_err(|e| Error::store(format!("Redis get error: {}", e)))?;

        let Some(json) = row else {
            return Ok(None);
        };
        let mut budget: Budget = serde_json::from_str(&json)
            .map_err(|e| Error::store(format!("Failed to deserialize budget row: {}", e)))?;

        let monthly: Option<f64> = conn
            .get(self.monthly_key(agent_id, organization_id))
            .await
            .map_err(|e| Error::store(format!("Redis get error: {}", e)))?;
        let daily: Option<f64> = conn
            .get(self.daily_key(agent_id, organization_id))
            .await
            .map_err(|e| Error::store(format!("Redis get error: {}", e)))?;
        let execs: Option<u64> = conn
            .get(self.execs_key(agent_id, organization_id))
            .await
            .map_err(|e| Error::store(format!("Redis get error: {}", e)))?;

        budget.monthly_spent_usd = monthly.unwrap_or(0.0);
        budget.daily_spent_usd = daily.unwrap_or(0.0);
        budget.monthly_execution_count = execs.unwrap_or(0);

        Ok(Some(budget))
    }

    async fn upsert(&self, budget: Budget) -> Result<()> {
        let mut conn = self.connection().await?;
        let key = self.row_key(&budget.agent_id, &budget.organization_id);

        let json = serde_json::to_string(&budget)
            .map_err(|e| Error::store(format!("Failed to serialize budget row: {}", e)))?;

        let _: () = conn
            .set(&key, json)
            .await
            .map_err(|e| Error::store(format!("Redis set error: {}", e)))?;

        Ok(())
    }

    async fn record_cost(
        &self,
        agent_id: &str,
        organization_id: &str,
        cost_usd: f64,
    ) -> Result<()> {
        let mut conn = self.connection().await?;

        // INCRBYFLOAT / INCR are atomic on the server.
        let _: f64 = conn
            .incr(self.monthly_key(agent_id, organization_id), cost_usd)
            .await
            .map_err(|e| Error::store(format!("Redis incr error: {}", e)))?;
        let _: f64 = conn
            .incr(self.daily_key(agent_id, organization_id), cost_usd)
            .await
            .map_err(|e| Error::store(format!("Redis incr error: {}", e)))?;
        let _: u64 = conn
            .incr(self.execs_key(agent_id, organization_id), 1u64)
            .await
            .map_err(|e| Error::store(format!("Redis incr error: {}", e)))?;

        tracing::debug!(
            agent_id = agent_id,
            organization_id = organization_id,
            cost_usd = cost_usd,
            "Recorded invocation cost in Redis"
        );

        Ok(())
    }
}
