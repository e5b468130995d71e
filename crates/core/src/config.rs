use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::types::{ConflictStrategy, RateLimitConfig};
use crate::types::{DEFAULT_DEGRADATION_THRESHOLD, DEFAULT_WARNING_THRESHOLD};

/// Top-level configuration for the governance gate.
#[derive(Debug, Deserialize, Clone)]
pub struct GateConfig {
    pub policy: PolicySettings,
    pub budget: BudgetSettings,
    pub rate_limit: RateLimitConfig,
    pub triggers: TriggerSettings,
    pub approval: ApprovalSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PolicySettings {
    /// DENY when zero policies match. Fail-open (`false`) is for
    /// environments where policies are additive restrictions only.
    pub fail_closed: bool,
    pub strategy: ConflictStrategy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BudgetSettings {
    /// Usage fraction at which `warning_triggered` is set.
    pub warning_threshold: f64,
    /// Usage fraction at which `degraded_mode` is set (advisory).
    pub degradation_threshold: f64,
}

/// A named sensitive-data pattern; the category, never the matched text,
/// is what surfaces in results.
#[derive(Debug, Deserialize, Clone)]
pub struct SensitivePattern {
    pub category: String,
    pub pattern: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TriggerSettings {
    /// Approval required when estimated cost strictly exceeds this.
    pub cost_threshold_usd: Option<f64>,
    /// Approval required when estimated tokens strictly exceed this.
    pub token_threshold: Option<u64>,
    #[serde(default)]
    pub on_first_invocation: bool,
    #[serde(default)]
    pub on_new_agent: bool,
    /// Global flag: any production invocation requires approval.
    #[serde(default)]
    pub production_requires_approval: bool,
    #[serde(default)]
    pub environments_requiring_approval: Vec<String>,
    /// Case-insensitive regexes matched against the serialized payload.
    #[serde(default)]
    pub payload_patterns: Vec<String>,
    /// Extra sensitive-data patterns on top of the built-in set.
    #[serde(default)]
    pub sensitive_patterns: Vec<SensitivePattern>,
    /// Approval required when the windowed invocation count reaches this.
    pub rate_trigger_count: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApprovalSettings {
    /// How long a request stays decidable.
    pub ttl_seconds: u64,
    /// Distinct APPROVE votes needed.
    pub required_approvers: u32,
}

impl GateConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("AGENTGATE_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Map APP__RATE_LIMIT__PER_MINUTE=120 to rate_limit.per_minute
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            policy: PolicySettings {
                fail_closed: true,
                strategy: ConflictStrategy::DenyOverrides,
            },
            budget: BudgetSettings {
                warning_threshold: DEFAULT_WARNING_THRESHOLD,
                degradation_threshold: DEFAULT_DEGRADATION_THRESHOLD,
            },
            rate_limit: RateLimitConfig::default(),
            triggers: TriggerSettings::default(),
            approval: ApprovalSettings {
                ttl_seconds: 86_400,
                required_approvers: 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = GateConfig::default();
        assert!(cfg.policy.fail_closed);
        assert_eq!(cfg.policy.strategy, ConflictStrategy::DenyOverrides);
        assert!((cfg.budget.warning_threshold - 0.80).abs() < 1e-9);
        assert!((cfg.budget.degradation_threshold - 0.90).abs() < 1e-9);
        assert_eq!(cfg.rate_limit.per_minute, 60);
        assert_eq!(cfg.approval.required_approvers, 1);
        assert!(cfg.triggers.cost_threshold_usd.is_none());
    }

    #[test]
    fn test_trigger_settings_partial_deserialization() {
        let json = r#"{
            "cost_threshold_usd": 25.0,
            "environments_requiring_approval": ["production"],
            "sensitive_patterns": [
                { "category": "employee_id", "pattern": "EMP-\\d{6}" }
            ]
        }"#;

        let settings: TriggerSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.cost_threshold_usd, Some(25.0));
        assert_eq!(settings.environments_requiring_approval, vec!["production"]);
        assert_eq!(settings.sensitive_patterns[0].category, "employee_id");
        // Omitted fields fall back to their defaults.
        assert!(!settings.on_first_invocation);
        assert!(settings.payload_patterns.is_empty());
        assert!(settings.rate_trigger_count.is_none());
    }
}
