#![deny(unused)]
//! Governance evaluation engine for AgentGate.
//!
//! This crate provides the gate run before every external-agent invocation:
//! - ABAC policy evaluation with configurable conflict resolution
//! - Budget enforcement (fail-closed)
//! - Multi-window rate limiting (fail-open)
//! - Approval-trigger evaluation and the human-in-the-loop state machine
//! - The orchestrator composing all of the above into a single decision

pub mod approval;
pub mod budget;
pub mod metrics;
pub mod orchestrator;
pub mod policy;
pub mod rate_limit;
pub mod tracing_layer;
pub mod triggers;

pub use approval::ApprovalManager;
pub use budget::{BudgetEnforcer, BUDGET_FAIL_CLOSED};
pub use metrics::{setup_metrics_recorder, track_approval_event, track_gate_decision};
pub use orchestrator::{GovernanceOrchestrator, GovernanceStatus};
pub use policy::{PolicyEngine, PolicyFile};
pub use rate_limit::{RateLimiter, RATE_LIMIT_FAIL_OPEN};
pub use tracing_layer::configure_tracing;
pub use triggers::ApprovalTriggerEvaluator;
