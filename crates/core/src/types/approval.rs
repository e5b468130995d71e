use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::trigger::TriggerContext;

/// Lifecycle of an approval request. `Pending` is the only non-terminal
/// state; terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
            ApprovalStatus::Expired => "EXPIRED",
        }
    }
}

/// A human approver's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Approve,
    Reject,
}

/// One recorded decision on an approval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approver_id: String,
    pub verdict: Verdict,
    pub decided_at: DateTime<Utc>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A human-in-the-loop approval request raised by a trigger match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,

    /// Snapshot of the invocation that raised the request.
    pub context: TriggerContext,
    /// Why approval was required (trigger evaluator reason).
    pub trigger_reason: String,

    /// Distinct APPROVE decisions needed to approve.
    pub required_approvers: u32,
    pub status: ApprovalStatus,

    /// Identity that raised the invocation; may never self-approve.
    pub requester_id: String,

    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,

    #[serde(default)]
    pub decisions: Vec<ApprovalDecision>,

    /// Optimistic-concurrency version, bumped by the store on every update.
    #[serde(default)]
    pub version: u64,
}

impl ApprovalRequest {
    /// Whether the request's TTL has elapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Count of distinct approvers that voted APPROVE.
    pub fn approve_count(&self) -> usize {
        let mut approvers: Vec<&str> = self
            .decisions
            .iter()
            .filter(|d| d.verdict == Verdict::Approve)
            .map(|d| d.approver_id.as_str())
            .collect();
        approvers.sort_unstable();
        approvers.dedup();
        approvers.len()
    }

    /// Whether the given approver already voted APPROVE.
    pub fn has_approved(&self, approver_id: &str) -> bool {
        self.decisions
            .iter()
            .any(|d| d.verdict == Verdict::Approve && d.approver_id == approver_id)
    }
}
