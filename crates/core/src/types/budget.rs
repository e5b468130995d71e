use serde::{Deserialize, Serialize};

/// Default warning threshold as a fraction of the monthly budget.
pub const DEFAULT_WARNING_THRESHOLD: f64 = 0.80;

/// Default degradation threshold as a fraction of the monthly budget.
pub const DEFAULT_DEGRADATION_THRESHOLD: f64 = 0.90;

/// Spend caps and running totals for one external agent.
///
/// `monthly_spent_usd` is monotonically non-decreasing within a period;
/// resetting it at period rollover is the backing store's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub agent_id: String,
    pub organization_id: String,

    /// Monthly spend cap in USD.
    pub monthly_budget_usd: f64,
    /// Optional daily spend cap in USD.
    #[serde(default)]
    pub daily_budget_usd: Option<f64>,

    #[serde(default)]
    pub monthly_spent_usd: f64,
    #[serde(default)]
    pub daily_spent_usd: f64,

    /// Optional cap on invocations per month.
    #[serde(default)]
    pub max_executions_per_month: Option<u64>,
    #[serde(default)]
    pub monthly_execution_count: u64,

    #[serde(default = "default_warning")]
    pub warning_threshold: f64,
    #[serde(default = "default_degradation")]
    pub degradation_threshold: f64,
}

fn default_warning() -> f64 {
    DEFAULT_WARNING_THRESHOLD
}

fn default_degradation() -> f64 {
    DEFAULT_DEGRADATION_THRESHOLD
}

impl Budget {
    /// Create a budget with default thresholds and zero spend.
    pub fn new(
        agent_id: impl Into<String>,
        organization_id: impl Into<String>,
        monthly_budget_usd: f64,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            organization_id: organization_id.into(),
            monthly_budget_usd,
            daily_budget_usd: None,
            monthly_spent_usd: 0.0,
            daily_spent_usd: 0.0,
            max_executions_per_month: None,
            monthly_execution_count: 0,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            degradation_threshold: DEFAULT_DEGRADATION_THRESHOLD,
        }
    }

    /// Remaining monthly budget in USD.
    pub fn remaining_usd(&self) -> f64 {
        self.monthly_budget_usd - self.monthly_spent_usd
    }

    /// Fraction of the monthly budget already spent.
    pub fn usage_percentage(&self) -> f64 {
        if self.monthly_budget_usd <= 0.0 {
            0.0
        } else {
            self.monthly_spent_usd / self.monthly_budget_usd
        }
    }
}

/// Outcome of a budget check. Derived per call, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetCheckResult {
    pub allowed: bool,
    pub reason: String,
    pub remaining_budget_usd: f64,
    pub usage_percentage: f64,
    pub warning_triggered: bool,
    /// Advisory only: callers may skip expensive sub-agents, but the
    /// invocation itself is still allowed.
    pub degraded_mode: bool,
}

impl BudgetCheckResult {
    /// A denial with the given reason and remaining budget. Usage starts
    /// at 0.0 for the paths where no budget row was loaded.
    pub fn denied(reason: impl Into<String>, remaining_budget_usd: f64) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            remaining_budget_usd,
            usage_percentage: 0.0,
            warning_triggered: false,
            degraded_mode: false,
        }
    }

    /// Attach the observed usage fraction when the budget row is known.
    pub fn with_usage(mut self, usage_percentage: f64) -> Self {
        self.usage_percentage = usage_percentage;
        self
    }
}
