use serde::{Deserialize, Serialize};

/// Everything the approval-trigger evaluator inspects about an invocation.
///
/// History-derived fields (`is_first_invocation`, `is_new_agent`,
/// `invocation_count_in_window`) are populated by the caller from the
/// invocation-history provider; the evaluator itself never does lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerContext {
    pub agent_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub organization_id: String,

    /// Opaque invocation payload, pattern-matched as serialized JSON.
    #[serde(default)]
    pub payload: serde_json::Value,

    pub estimated_cost_usd: f64,
    pub estimated_tokens: u64,
    pub environment: String,

    #[serde(default)]
    pub is_first_invocation: bool,
    #[serde(default)]
    pub is_new_agent: bool,
    #[serde(default)]
    pub invocation_count_in_window: u64,
}

impl TriggerContext {
    /// Minimal context with empty payload and no history flags.
    pub fn new(
        agent_id: impl Into<String>,
        organization_id: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            user_id: None,
            organization_id: organization_id.into(),
            payload: serde_json::Value::Null,
            estimated_cost_usd: 0.0,
            estimated_tokens: 0,
            environment: environment.into(),
            is_first_invocation: false,
            is_new_agent: false,
            invocation_count_in_window: 0,
        }
    }
}

/// Aggregate result of running every configured trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResult {
    pub triggered: bool,
    /// Trigger names in evaluation order; one invocation can match several.
    pub triggers_matched: Vec<String>,
    /// Pipe-joined human-readable summary.
    pub reason: String,
    /// Structured detail per matched trigger, keyed by trigger name.
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl TriggerResult {
    /// A result with no triggers matched.
    pub fn none() -> Self {
        Self {
            triggered: false,
            triggers_matched: Vec::new(),
            reason: String::new(),
            details: serde_json::Map::new(),
        }
    }
}
