//! ABAC policy engine.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::RwLock;
use std::time::Instant;

use agentgate_core::types::{
    ConflictStrategy, Policy, PolicyCondition, PolicyEffect, PolicyEvaluationResult, Principal,
};

/// A versioned policy document, loadable from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyFile {
    pub version: String,
    pub name: String,
    pub policies: Vec<Policy>,
}

/// Evaluates the owned policy set against an invocation principal.
///
/// Readers evaluate concurrently; writers take exclusive access only for
/// add/remove/clear. Evaluation is pure: no side effects, no store access.
pub struct PolicyEngine {
    policies: RwLock<Vec<Policy>>,
    strategy: ConflictStrategy,
    fail_closed: bool,
}

impl PolicyEngine {
    /// Create an empty engine.
    pub fn new(strategy: ConflictStrategy, fail_closed: bool) -> Self {
        Self {
            policies: RwLock::new(Vec::new()),
            strategy,
            fail_closed,
        }
    }

    /// Load the policy set from a YAML file.
    pub fn load(
        path: impl AsRef<Path>,
        strategy: ConflictStrategy,
        fail_closed: bool,
    ) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read policy file: {:?}", path.as_ref()))?;
        let file: PolicyFile =
            serde_yaml::from_str(&content).with_context(|| "Failed to parse policy YAML")?;

        tracing::info!(
            name = %file.name,
            version = %file.version,
            policies = file.policies.len(),
            "Loaded policy file"
        );

        let engine = Self::new(strategy, fail_closed);
        for policy in file.policies {
            engine.add_policy(policy);
        }
        Ok(engine)
    }

    /// Append a policy. Insertion order is the `FirstMatch` tie-breaker.
    pub fn add_policy(&self, policy: Policy) {
        self.policies.write().unwrap().push(policy);
    }

    /// Remove a policy by id. Returns whether anything was removed.
    pub fn remove_policy(&self, id: &str) -> bool {
        let mut policies = self.policies.write().unwrap();
        let before = policies.len();
        policies.retain(|p| p.id != id);
        policies.len() != before
    }

    /// Drop every policy.
    pub fn clear(&self) {
        self.policies.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.policies.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evaluate against the current wall clock.
    pub fn evaluate(&self, principal: &Principal) -> PolicyEvaluationResult {
        self.evaluate_at(principal, Utc::now())
    }

    /// Evaluate at an explicit timestamp (time conditions are relative
    /// to it).
    pub fn evaluate_at(&self, principal: &Principal, now: DateTime<Utc>) -> PolicyEvaluationResult {
        let started = Instant::now();

        let policies = self.policies.read().unwrap();
        let matched: Vec<&Policy> = policies
            .iter()
            .filter(|p| p.enabled && Self::matches(p, principal, now))
            .collect();

        let matched_ids: Vec<String> = matched.iter().map(|p| p.id.clone()).collect();

        let (effect, reason) = if matched.is_empty() {
            if self.fail_closed {
                (PolicyEffect::Deny, "no policies matched".to_string())
            } else {
                (PolicyEffect::Allow, "no policies matched".to_string())
            }
        } else {
            self.resolve(&matched)
        };

        let result = PolicyEvaluationResult {
            effect,
            reason,
            matched_policies: matched_ids,
            duration_micros: started.elapsed().as_micros() as u64,
        };

        tracing::debug!(
            agent_id = %principal.agent_id,
            effect = ?result.effect,
            matched = result.matched_policies.len(),
            "Policy evaluation"
        );

        result
    }

    /// Pick a winning effect among matched policies per the configured
    /// conflict-resolution strategy.
    fn resolve(&self, matched: &[&Policy]) -> (PolicyEffect, String) {
        match self.strategy {
            ConflictStrategy::DenyOverrides => {
                if let Some(p) = matched.iter().find(|p| p.effect == PolicyEffect::Deny) {
                    (PolicyEffect::Deny, format!("denied by policy: {}", p.name))
                } else {
                    let p = matched[0];
                    (PolicyEffect::Allow, format!("allowed by policy: {}", p.name))
                }
            }
            ConflictStrategy::AllowOverrides => {
                if let Some(p) = matched.iter().find(|p| p.effect == PolicyEffect::Allow) {
                    (PolicyEffect::Allow, format!("allowed by policy: {}", p.name))
                } else {
                    let p = matched[0];
                    (PolicyEffect::Deny, format!("denied by policy: {}", p.name))
                }
            }
            ConflictStrategy::FirstMatch => {
                // Stable sort: ties keep insertion order.
                let mut ordered = matched.to_vec();
                ordered.sort_by_key(|p| std::cmp::Reverse(p.priority));
                let winner = ordered[0];
                let verb = match winner.effect {
                    PolicyEffect::Allow => "allowed",
                    PolicyEffect::Deny => "denied",
                };
                (winner.effect, format!("{} by policy: {}", verb, winner.name))
            }
        }
    }

    fn matches(policy: &Policy, principal: &Principal, now: DateTime<Utc>) -> bool {
        policy
            .conditions
            .iter()
            .all(|c| Self::condition_matches(c, principal, now))
    }

    /// A condition that cannot be evaluated (unknown kind, malformed time
    /// or weekday strings) counts as "did not match" rather than failing
    /// the evaluation.
    fn condition_matches(
        condition: &PolicyCondition,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> bool {
        match condition {
            PolicyCondition::Environment { environments } => {
                environments.iter().any(|e| e == &principal.environment)
            }
            PolicyCondition::Role { roles } => {
                roles.iter().any(|r| principal.roles.contains(r))
            }
            PolicyCondition::Time { start, end, days } => {
                let (Ok(start), Ok(end)) = (
                    NaiveTime::parse_from_str(start, "%H:%M"),
                    NaiveTime::parse_from_str(end, "%H:%M"),
                ) else {
                    tracing::warn!(start = %start, end = %end, "Unparseable time condition");
                    return false;
                };

                let parsed_days: Vec<Weekday> =
                    days.iter().filter_map(|d| d.parse().ok()).collect();
                if parsed_days.len() != days.len() {
                    tracing::warn!(days = ?days, "Unparseable weekday in time condition");
                    return false;
                }

                use chrono::{Datelike, Timelike};
                if !parsed_days.contains(&now.weekday()) {
                    return false;
                }

                let minute_of_day = now.hour() * 60 + now.minute();
                let start_min = start.hour() * 60 + start.minute();
                let end_min = end.hour() * 60 + end.minute();

                if start_min <= end_min {
                    minute_of_day >= start_min && minute_of_day <= end_min
                } else {
                    // Range spans midnight.
                    minute_of_day >= start_min || minute_of_day <= end_min
                }
            }
            PolicyCondition::Unknown => false,
        }
    }
}
