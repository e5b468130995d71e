//! The governance gate: policy -> budget and rate limit (in parallel)
//! -> triggers -> approval hold.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use agentgate_core::{
    config::ApprovalSettings,
    traits::InvocationHistory,
    types::{GateDecision, InvocationContext, PolicyEffect, TriggerContext, WindowUsage},
    Result,
};

use crate::approval::ApprovalManager;
use crate::budget::BudgetEnforcer;
use crate::metrics::{track_approval_event, track_gate_decision};
use crate::policy::PolicyEngine;
use crate::rate_limit::RateLimiter;
use crate::triggers::ApprovalTriggerEvaluator;

/// Read-only snapshot for observability/dashboard surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceStatus {
    pub policy_effect: PolicyEffect,
    pub policy_reason: String,
    pub budget_usage_percentage: f64,
    pub budget_remaining_usd: f64,
    pub degraded_mode: bool,
    /// -1 when the counter store is unreachable.
    pub rate_remaining: i64,
    pub rate_usage: WindowUsage,
}

/// Trailing window consulted for the invocation-rate trigger when a
/// history provider is attached.
const HISTORY_WINDOW_SECS: u64 = 3_600;

/// Composes the four evaluators into the single gate invoked before
/// dispatching to an external agent.
pub struct GovernanceOrchestrator {
    policy: Arc<PolicyEngine>,
    budget: Arc<BudgetEnforcer>,
    rate_limiter: Arc<RateLimiter>,
    triggers: Arc<ApprovalTriggerEvaluator>,
    approvals: Arc<ApprovalManager>,
    approval_settings: ApprovalSettings,
    history: Option<Arc<dyn InvocationHistory>>,
}

impl GovernanceOrchestrator {
    pub fn new(
        policy: Arc<PolicyEngine>,
        budget: Arc<BudgetEnforcer>,
        rate_limiter: Arc<RateLimiter>,
        triggers: Arc<ApprovalTriggerEvaluator>,
        approvals: Arc<ApprovalManager>,
        approval_settings: ApprovalSettings,
    ) -> Self {
        Self {
            policy,
            budget,
            rate_limiter,
            triggers,
            approvals,
            approval_settings,
            history: None,
        }
    }

    /// Attach an invocation-history provider. With one attached, the
    /// history-derived trigger fields (`is_first_invocation`,
    /// `invocation_count_in_window`) are looked up here instead of being
    /// trusted from the caller.
    pub fn with_invocation_history(mut self, history: Arc<dyn InvocationHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// The approval manager, for deciding and inspecting held requests.
    pub fn approvals(&self) -> &ApprovalManager {
        &self.approvals
    }

    /// The single call site integrators use before dispatching an
    /// invocation. Aggregates the first blocking reason in the order
    /// policy -> budget -> rate limit -> approval-pending.
    pub async fn authorize(&self, ctx: &InvocationContext) -> GateDecision {
        let started = Instant::now();
        let decision = self.authorize_inner(ctx).await;

        let outcome = if decision.pending_approval_id.is_some() {
            "pending_approval"
        } else if decision.allowed {
            "allowed"
        } else {
            "denied"
        };
        track_gate_decision(outcome, started.elapsed().as_secs_f64());

        tracing::info!(
            agent_id = %ctx.trigger.agent_id,
            allowed = decision.allowed,
            outcome = outcome,
            reason = %decision.reason,
            "Gate decision"
        );

        decision
    }

    async fn authorize_inner(&self, ctx: &InvocationContext) -> GateDecision {
        // Policy first: pure and cheapest, and a DENY short-circuits.
        let policy_result = self.policy.evaluate(&ctx.principal);
        if !policy_result.is_allowed() {
            return GateDecision::denied(policy_result.reason);
        }

        // Budget and rate limit are independent reads; run them together.
        let (budget_result, rate_result) = tokio::join!(
            self.budget.check_budget(
                &ctx.trigger.agent_id,
                &ctx.trigger.organization_id,
                ctx.trigger.estimated_cost_usd,
            ),
            self.rate_limiter
                .check_rate_limit(&ctx.trigger.agent_id, ctx.trigger.user_id.as_deref())
        );

        if !budget_result.allowed {
            return GateDecision::denied(budget_result.reason);
        }

        if !rate_result.allowed {
            let window = rate_result
                .limit_exceeded
                .map(|w| w.as_str())
                .unwrap_or("unknown");
            return GateDecision::denied(format!(
                "rate limit exceeded ({}), retry in {}s",
                window, rate_result.retry_after_seconds
            ));
        }

        let trigger_ctx = self.enriched_trigger_context(&ctx.trigger).await;
        let trigger_result = self.triggers.evaluate(&trigger_ctx);
        if !trigger_result.triggered {
            let mut decision = GateDecision::allowed("all governance checks passed");
            decision.degraded_mode = budget_result.degraded_mode;
            return decision;
        }

        // Hold the invocation behind a human approval.
        match self
            .approvals
            .create(
                trigger_ctx,
                trigger_result.reason.clone(),
                ctx.requester_id(),
                self.approval_settings.required_approvers,
                Duration::seconds(self.approval_settings.ttl_seconds as i64),
            )
            .await
        {
            Ok(request) => {
                track_approval_event("created");
                GateDecision {
                    allowed: false,
                    reason: format!("approval required: {}", trigger_result.reason),
                    pending_approval_id: Some(request.id),
                    degraded_mode: budget_result.degraded_mode,
                }
            }
            Err(e) => {
                // Holding an invocation we cannot track would be worse
                // than denying it outright.
                tracing::warn!(error = %e, "Failed to create approval request, denying");
                GateDecision::denied(format!(
                    "approval required but request could not be created: {}",
                    e
                ))
            }
        }
    }

    /// Overlay history-derived fields from the attached provider. Lookup
    /// failures keep the caller-supplied values; history is advisory.
    async fn enriched_trigger_context(&self, trigger: &TriggerContext) -> TriggerContext {
        let Some(history) = &self.history else {
            return trigger.clone();
        };

        let mut enriched = trigger.clone();
        match history
            .invocation_count(
                &enriched.agent_id,
                enriched.user_id.as_deref(),
                &enriched.organization_id,
                HISTORY_WINDOW_SECS,
            )
            .await
        {
            Ok(count) => enriched.invocation_count_in_window = count,
            Err(e) => {
                tracing::warn!(
                    agent_id = %enriched.agent_id,
                    error = %e,
                    "Invocation-count lookup failed"
                );
            }
        }
        match history
            .is_first_invocation(
                &enriched.agent_id,
                enriched.user_id.as_deref(),
                &enriched.organization_id,
            )
            .await
        {
            Ok(first) => enriched.is_first_invocation = first,
            Err(e) => {
                tracing::warn!(
                    agent_id = %enriched.agent_id,
                    error = %e,
                    "First-invocation lookup failed"
                );
            }
        }
        enriched
    }

    /// Post-invocation cost reconciliation.
    pub async fn record_outcome(
        &self,
        agent_id: &str,
        organization_id: &str,
        actual_cost: f64,
        success: bool,
    ) -> Result<()> {
        self.budget
            .record_invocation_cost(agent_id, organization_id, actual_cost, success)
            .await
    }

    /// Current governance posture for one agent, for dashboards. Reads
    /// only; consumes no rate-limit quota.
    pub async fn status(&self, ctx: &InvocationContext) -> GovernanceStatus {
        let policy_result = self.policy.evaluate(&ctx.principal);

        let (budget_result, rate_result) = tokio::join!(
            self.budget
                .check_budget(&ctx.trigger.agent_id, &ctx.trigger.organization_id, 0.0),
            self.rate_limiter
                .snapshot(&ctx.trigger.agent_id, ctx.trigger.user_id.as_deref())
        );

        GovernanceStatus {
            policy_effect: policy_result.effect,
            policy_reason: policy_result.reason,
            budget_usage_percentage: budget_result.usage_percentage,
            budget_remaining_usd: budget_result.remaining_budget_usd,
            degraded_mode: budget_result.degraded_mode,
            rate_remaining: rate_result.remaining,
            rate_usage: rate_result.current_usage,
        }
    }
}
