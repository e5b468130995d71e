//! Budget enforcement.

use std::sync::Arc;

use agentgate_core::{
    config::BudgetSettings,
    traits::BudgetStore,
    types::{Budget, BudgetCheckResult},
    Result,
};

/// Budget checks fail closed: an unreachable budget store denies the
/// invocation, because the cost of allowing is unbounded spend. This is the
/// deliberate asymmetry with [`crate::rate_limit::RATE_LIMIT_FAIL_OPEN`].
pub const BUDGET_FAIL_CLOSED: bool = true;

/// Tracks spend against monthly/daily caps per external agent.
pub struct BudgetEnforcer {
    store: Arc<dyn BudgetStore>,
    settings: BudgetSettings,
}

impl BudgetEnforcer {
    pub fn new(store: Arc<dyn BudgetStore>, settings: BudgetSettings) -> Self {
        Self { store, settings }
    }

    /// Check whether an invocation with the given estimated cost fits the
    /// agent's budget.
    ///
    /// Denials and infrastructure failures both come back as
    /// `allowed = false` results; this method never errors.
    pub async fn check_budget(
        &self,
        agent_id: &str,
        organization_id: &str,
        estimated_cost: f64,
    ) -> BudgetCheckResult {
        let budget = match self.store.get(agent_id, organization_id).await {
            Ok(Some(budget)) => budget,
            Ok(None) => {
                // No provisioned budget row means no authorized spend.
                return BudgetCheckResult::denied(
                    format!("no budget configured for agent {}", agent_id),
                    0.0,
                );
            }
            Err(e) => {
                // BUDGET_FAIL_CLOSED: never silently allow unlimited spend.
                tracing::warn!(
                    agent_id = agent_id,
                    error = %e,
                    "Budget store unavailable, failing closed"
                );
                return BudgetCheckResult::denied(
                    format!("budget store unavailable (fail-closed): {}", e),
                    0.0,
                );
            }
        };

        self.evaluate(&budget, estimated_cost)
    }

    fn evaluate(&self, budget: &Budget, estimated_cost: f64) -> BudgetCheckResult {
        let remaining = budget.remaining_usd();
        let usage = budget.usage_percentage();

        if let Some(max_execs) = budget.max_executions_per_month {
            if budget.monthly_execution_count >= max_execs {
                return BudgetCheckResult::denied(
                    format!(
                        "monthly execution cap reached ({} of {})",
                        budget.monthly_execution_count, max_execs
                    ),
                    remaining,
                )
                .with_usage(usage);
            }
        }

        if let Some(daily_cap) = budget.daily_budget_usd {
            if budget.daily_spent_usd + estimated_cost > daily_cap {
                return BudgetCheckResult::denied(
                    format!(
                        "daily budget threshold exceeded (${:.2} estimated, ${:.2} remaining today)",
                        estimated_cost,
                        (daily_cap - budget.daily_spent_usd).max(0.0)
                    ),
                    remaining,
                )
                .with_usage(usage);
            }
        }

        if budget.monthly_spent_usd + estimated_cost > budget.monthly_budget_usd {
            return BudgetCheckResult::denied(
                format!(
                    "budget threshold exceeded (${:.2} estimated > ${:.2} remaining)",
                    estimated_cost, remaining
                ),
                remaining,
            )
            .with_usage(usage);
        }
        let warning_threshold = if budget.warning_threshold > 0.0 {
            budget.warning_threshold
        } else {
            self.settings.warning_threshold
        };
        let degradation_threshold = if budget.degradation_threshold > 0.0 {
            budget.degradation_threshold
        } else {
            self.settings.degradation_threshold
        };

        let warning = usage >= warning_threshold;
        let degraded = usage >= degradation_threshold;

        if warning {
            tracing::info!(
                agent_id = %budget.agent_id,
                usage = usage,
                degraded = degraded,
                "Budget usage past warning threshold"
            );
        }

        BudgetCheckResult {
            allowed: true,
            reason: format!("within budget (${:.2} remaining)", remaining),
            remaining_budget_usd: remaining,
            usage_percentage: usage,
            warning_triggered: warning,
            degraded_mode: degraded,
        }
    }

    /// Reconcile the actual cost after the invocation completed. This is
    /// where drift between estimate and actual is settled; the increment is
    /// a single atomic operation on the store.
    pub async fn record_invocation_cost(
        &self,
        agent_id: &str,
        organization_id: &str,
        actual_cost: f64,
        success: bool,
    ) -> Result<()> {
        self.store
            .record_cost(agent_id, organization_id, actual_cost)
            .await?;

        tracing::debug!(
            agent_id = agent_id,
            organization_id = organization_id,
            actual_cost = actual_cost,
            success = success,
            "Reconciled invocation cost"
        );

        Ok(())
    }
}
