//! Approval trigger evaluation.
//!
//! Every configured trigger is checked independently and the matches are
//! unioned, so one invocation can match several triggers at once. The
//! sensitive-data detector is a best-effort advisory heuristic, not a
//! compliance guarantee; it reports matched category names only, never the
//! matched text.

use regex::{Regex, RegexBuilder};
use serde_json::json;

use agentgate_core::{
    config::TriggerSettings,
    types::{TriggerContext, TriggerResult},
};

/// Built-in sensitive-data patterns: `(category, pattern)`.
const BUILTIN_SENSITIVE_PATTERNS: &[(&str, &str)] = &[
    ("ssn", r"\b\d{3}-\d{2}-\d{4}\b"),
    ("credit_card", r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b"),
    ("api_key", r"(?i)\b(?:sk|pk|api|key|token)[-_][A-Za-z0-9]{16,}\b"),
    ("password", r#"(?i)password["']?\s*[:=]\s*\S+"#),
];

/// Decides whether an invocation needs human approval, and why.
pub struct ApprovalTriggerEvaluator {
    cost_threshold_usd: Option<f64>,
    token_threshold: Option<u64>,
    on_first_invocation: bool,
    on_new_agent: bool,
    production_requires_approval: bool,
    environments_requiring_approval: Vec<String>,
    payload_patterns: Vec<Regex>,
    sensitive_patterns: Vec<(String, Regex)>,
    rate_trigger_count: Option<u64>,
}

impl ApprovalTriggerEvaluator {
    /// Build an evaluator from settings. Invalid regexes are dropped here
    /// with a warning and never surface at evaluation time.
    pub fn new(settings: TriggerSettings) -> Self {
        let payload_patterns = settings
            .payload_patterns
            .iter()
            .filter_map(|p| {
                match RegexBuilder::new(p).case_insensitive(true).build() {
                    Ok(re) => Some(re),
                    Err(e) => {
                        tracing::warn!(pattern = %p, error = %e, "Skipping invalid payload pattern");
                        None
                    }
                }
            })
            .collect();

        let mut sensitive_patterns: Vec<(String, Regex)> = BUILTIN_SENSITIVE_PATTERNS
            .iter()
            .map(|(category, pattern)| {
                // Built-ins are compile-time constants; they always parse.
                (category.to_string(), Regex::new(pattern).unwrap())
            })
            .collect();
        for extra in &settings.sensitive_patterns {
            match Regex::new(&extra.pattern) {
                Ok(re) => sensitive_patterns.push((extra.category.clone(), re)),
                Err(e) => {
                    tracing::warn!(
                        category = %extra.category,
                        error = %e,
                        "Skipping invalid sensitive-data pattern"
                    );
                }
            }
        }

        Self {
            cost_threshold_usd: settings.cost_threshold_usd,
            token_threshold: settings.token_threshold,
            on_first_invocation: settings.on_first_invocation,
            on_new_agent: settings.on_new_agent,
            production_requires_approval: settings.production_requires_approval,
            environments_requiring_approval: settings.environments_requiring_approval,
            payload_patterns,
            sensitive_patterns,
            rate_trigger_count: settings.rate_trigger_count,
        }
    }

    /// Run every trigger against the context.
    pub fn evaluate(&self, ctx: &TriggerContext) -> TriggerResult {
        let mut result = TriggerResult::none();
        let mut reasons: Vec<String> = Vec::new();

        let hit = |result: &mut TriggerResult,
                       reasons: &mut Vec<String>,
                       name: &str,
                       reason: String,
                       detail: serde_json::Value| {
            result.triggers_matched.push(name.to_string());
            result.details.insert(name.to_string(), detail);
            reasons.push(reason);
        };

        // Thresholds are strict: equality does not trigger.
        if let Some(threshold) = self.cost_threshold_usd {
            if ctx.estimated_cost_usd > threshold {
                hit(
                    &mut result,
                    &mut reasons,
                    "cost_threshold",
                    format!(
                        "estimated cost ${:.2} exceeds threshold ${:.2}",
                        ctx.estimated_cost_usd, threshold
                    ),
                    json!({ "estimated_cost_usd": ctx.estimated_cost_usd, "threshold_usd": threshold }),
                );
            }
        }

        if let Some(threshold) = self.token_threshold {
            if ctx.estimated_tokens > threshold {
                hit(
                    &mut result,
                    &mut reasons,
                    "token_threshold",
                    format!(
                        "estimated tokens {} exceed threshold {}",
                        ctx.estimated_tokens, threshold
                    ),
                    json!({ "estimated_tokens": ctx.estimated_tokens, "threshold": threshold }),
                );
            }
        }

        if self.on_first_invocation && ctx.is_first_invocation {
            hit(
                &mut result,
                &mut reasons,
                "first_invocation",
                format!("first invocation of agent {}", ctx.agent_id),
                json!({ "agent_id": ctx.agent_id }),
            );
        }

        if self.on_new_agent && ctx.is_new_agent {
            hit(
                &mut result,
                &mut reasons,
                "new_agent",
                format!("agent {} was recently registered", ctx.agent_id),
                json!({ "agent_id": ctx.agent_id }),
            );
        }

        // Two independent environment sub-triggers; both may fire.
        if self.production_requires_approval && ctx.environment == "production" {
            hit(
                &mut result,
                &mut reasons,
                "production_environment",
                "production invocations require approval".to_string(),
                json!({ "environment": "production" }),
            );
        }

        if self
            .environments_requiring_approval
            .iter()
            .any(|e| e == &ctx.environment)
        {
            hit(
                &mut result,
                &mut reasons,
                "restricted_environment",
                format!("environment {} requires approval", ctx.environment),
                json!({ "environment": ctx.environment }),
            );
        }

        let payload_text = serde_json::to_string(&ctx.payload).unwrap_or_default();

        let matched_payload: Vec<String> = self
            .payload_patterns
            .iter()
            .filter(|re| re.is_match(&payload_text))
            .map(|re| re.as_str().to_string())
            .collect();
        if !matched_payload.is_empty() {
            hit(
                &mut result,
                &mut reasons,
                "payload_pattern",
                format!("payload matched {} configured pattern(s)", matched_payload.len()),
                json!({ "patterns": matched_payload }),
            );
        }

        let categories: Vec<String> = self
            .sensitive_patterns
            .iter()
            .filter(|(_, re)| re.is_match(&payload_text))
            .map(|(category, _)| category.clone())
            .collect();
        if !categories.is_empty() {
            hit(
                &mut result,
                &mut reasons,
                "sensitive_data",
                format!("payload contains sensitive data: {}", categories.join(", ")),
                json!({ "categories": categories }),
            );
        }

        if let Some(count) = self.rate_trigger_count {
            if ctx.invocation_count_in_window >= count {
                hit(
                    &mut result,
                    &mut reasons,
                    "invocation_rate",
                    format!(
                        "{} invocations in window reached trigger count {}",
                        ctx.invocation_count_in_window, count
                    ),
                    json!({ "count_in_window": ctx.invocation_count_in_window, "trigger_count": count }),
                );
            }
        }

        result.triggered = !result.triggers_matched.is_empty();
        result.reason = reasons.join(" | ");

        if result.triggered {
            tracing::info!(
                agent_id = %ctx.agent_id,
                triggers = ?result.triggers_matched,
                "Approval triggers matched"
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentgate_core::config::SensitivePattern;

    fn ctx() -> TriggerContext {
        TriggerContext::new("agent-1", "org-1", "staging")
    }

    #[test]
    fn test_cost_threshold_is_strict() {
        let evaluator = ApprovalTriggerEvaluator::new(TriggerSettings {
            cost_threshold_usd: Some(10.0),
            ..TriggerSettings::default()
        });

        let mut at_threshold = ctx();
        at_threshold.estimated_cost_usd = 10.0;
        assert!(!evaluator.evaluate(&at_threshold).triggered);

        let mut above = ctx();
        above.estimated_cost_usd = 10.01;
        let result = evaluator.evaluate(&above);
        assert!(result.triggered);
        assert_eq!(result.triggers_matched, vec!["cost_threshold"]);
    }

    #[test]
    fn test_multiple_triggers_union() {
        let evaluator = ApprovalTriggerEvaluator::new(TriggerSettings {
            cost_threshold_usd: Some(1.0),
            token_threshold: Some(100),
            production_requires_approval: true,
            ..TriggerSettings::default()
        });

        let mut context = ctx();
        context.environment = "production".into();
        context.estimated_cost_usd = 5.0;
        context.estimated_tokens = 500;

        let result = evaluator.evaluate(&context);
        assert_eq!(
            result.triggers_matched,
            vec!["cost_threshold", "token_threshold", "production_environment"]
        );
        assert_eq!(result.reason.matches(" | ").count(), 2);
    }

    #[test]
    fn test_environment_sub_triggers_both_fire() {
        let evaluator = ApprovalTriggerEvaluator::new(TriggerSettings {
            production_requires_approval: true,
            environments_requiring_approval: vec!["production".into()],
            ..TriggerSettings::default()
        });

        let mut context = ctx();
        context.environment = "production".into();

        let result = evaluator.evaluate(&context);
        assert_eq!(
            result.triggers_matched,
            vec!["production_environment", "restricted_environment"]
        );
    }

    #[test]
    fn test_sensitive_data_reports_categories_not_text() {
        let evaluator = ApprovalTriggerEvaluator::new(TriggerSettings::default());

        let mut context = ctx();
        context.payload = serde_json::json!({ "note": "ssn is 123-45-6789" });

        let result = evaluator.evaluate(&context);
        assert!(result.triggered);
        assert_eq!(result.triggers_matched, vec!["sensitive_data"]);
        assert!(result.reason.contains("ssn"));
        assert!(!result.reason.contains("123-45-6789"));
        let details = serde_json::to_string(&result.details).unwrap();
        assert!(!details.contains("123-45-6789"));
    }

    #[test]
    fn test_builtin_sensitive_categories() {
        let evaluator = ApprovalTriggerEvaluator::new(TriggerSettings::default());

        let cases = [
            (serde_json::json!({"card": "4111 1111 1111 1111"}), "credit_card"),
            (serde_json::json!({"key": "sk_a1b2c3d4e5f6g7h8i9j0"}), "api_key"),
            (serde_json::json!({"cfg": "password = hunter2secret"}), "password"),
        ];

        for (payload, category) in cases {
            let mut context = ctx();
            context.payload = payload;
            let result = evaluator.evaluate(&context);
            assert!(
                result.triggers_matched.contains(&"sensitive_data".to_string()),
                "expected sensitive_data for {}",
                category
            );
            let categories = result.details["sensitive_data"]["categories"].to_string();
            assert!(categories.contains(category), "{} not in {}", category, categories);
        }
    }

    #[test]
    fn test_caller_supplied_sensitive_pattern() {
        let evaluator = ApprovalTriggerEvaluator::new(TriggerSettings {
            sensitive_patterns: vec![SensitivePattern {
                category: "employee_id".into(),
                pattern: r"\bEMP-\d{6}\b".into(),
            }],
            ..TriggerSettings::default()
        });

        let mut context = ctx();
        context.payload = serde_json::json!({ "who": "EMP-123456" });

        let result = evaluator.evaluate(&context);
        assert!(result.reason.contains("employee_id"));
    }

    #[test]
    fn test_invalid_regex_skipped_at_construction() {
        let evaluator = ApprovalTriggerEvaluator::new(TriggerSettings {
            payload_patterns: vec!["[unclosed".into(), "deploy".into()],
            sensitive_patterns: vec![SensitivePattern {
                category: "broken".into(),
                pattern: "(".into(),
            }],
            ..TriggerSettings::default()
        });

        let mut context = ctx();
        context.payload = serde_json::json!({ "action": "DEPLOY now" });

        // The valid case-insensitive pattern still works.
        let result = evaluator.evaluate(&context);
        assert_eq!(result.triggers_matched, vec!["payload_pattern"]);
    }

    #[test]
    fn test_rate_trigger_uses_greater_or_equal() {
        let evaluator = ApprovalTriggerEvaluator::new(TriggerSettings {
            rate_trigger_count: Some(10),
            ..TriggerSettings::default()
        });

        let mut context = ctx();
        context.invocation_count_in_window = 9;
        assert!(!evaluator.evaluate(&context).triggered);

        context.invocation_count_in_window = 10;
        assert!(evaluator.evaluate(&context).triggered);
    }

    #[test]
    fn test_history_flags() {
        let evaluator = ApprovalTriggerEvaluator::new(TriggerSettings {
            on_first_invocation: true,
            on_new_agent: true,
            ..TriggerSettings::default()
        });

        let mut context = ctx();
        context.is_first_invocation = true;
        context.is_new_agent = true;

        let result = evaluator.evaluate(&context);
        assert_eq!(result.triggers_matched, vec!["first_invocation", "new_agent"]);
    }

    #[test]
    fn test_clean_context_matches_nothing() {
        let evaluator = ApprovalTriggerEvaluator::new(TriggerSettings::default());
        let result = evaluator.evaluate(&ctx());
        assert!(!result.triggered);
        assert!(result.reason.is_empty());
    }
}
