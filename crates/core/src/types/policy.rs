use serde::{Deserialize, Serialize};

// =============================================================================
// ABAC Policy Types
// =============================================================================

/// Effect of a policy when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyEffect {
    Allow,
    Deny,
}

/// A single predicate over a principal and a timestamp.
///
/// Conditions are a closed set; condition kinds this build does not know
/// about deserialize to `Unknown` and never match, instead of failing the
/// whole policy document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyCondition {
    /// Matches when the principal's environment is in the list.
    Environment { environments: Vec<String> },

    /// Matches when the current time falls in `[start, end]` ("HH:MM",
    /// a range may span midnight) on one of the listed weekdays
    /// ("mon".."sun" or full names).
    Time {
        start: String,
        end: String,
        days: Vec<String>,
    },

    /// Matches when the principal holds at least one of the listed roles.
    Role { roles: Vec<String> },

    /// Forward-compatibility arm: never matches.
    #[serde(other)]
    Unknown,
}

/// An ABAC policy: AND-combined conditions gating one effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub effect: PolicyEffect,
    /// All conditions must match for the policy to match. An empty list
    /// matches every invocation.
    #[serde(default)]
    pub conditions: Vec<PolicyCondition>,
    /// Higher priority is evaluated first under `FirstMatch`.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Rule for picking a winning effect when several policies match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Any matching DENY wins.
    DenyOverrides,
    /// Any matching ALLOW wins.
    AllowOverrides,
    /// Highest-priority match wins; ties break to first inserted.
    FirstMatch,
}

/// Result of evaluating the policy set against one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEvaluationResult {
    pub effect: PolicyEffect,
    pub reason: String,
    /// Ids of every policy that matched, not just the winner.
    pub matched_policies: Vec<String>,
    /// Wall-clock evaluation time in microseconds.
    pub duration_micros: u64,
}

impl PolicyEvaluationResult {
    pub fn is_allowed(&self) -> bool {
        self.effect == PolicyEffect::Allow
    }
}
