//! Human-in-the-loop approval state machine.
//!
//! Requests move PENDING -> {APPROVED, REJECTED, EXPIRED} exactly once.
//! Expiry is evaluated lazily at read/decide time; no background sweep is
//! required for correctness, though `sweep_expired` exists for reporting.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use agentgate_core::{
    traits::{ApprovalStore, ApproverAuthorizer, Notifier},
    types::{ApprovalDecision, ApprovalRequest, ApprovalStatus, TriggerContext, Verdict},
    Error, Result,
};

/// Retries for the optimistic write-back before giving up on contention.
const CAS_MAX_ATTEMPTS: usize = 5;

/// Creates, tracks, and resolves approval requests.
pub struct ApprovalManager {
    store: Arc<dyn ApprovalStore>,
    authorizer: Arc<dyn ApproverAuthorizer>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ApprovalManager {
    pub fn new(store: Arc<dyn ApprovalStore>, authorizer: Arc<dyn ApproverAuthorizer>) -> Self {
        Self {
            store,
            authorizer,
            notifier: None,
        }
    }

    /// Attach a notification channel for newly created requests.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Create a new PENDING request and notify listeners.
    pub async fn create(
        &self,
        context: TriggerContext,
        trigger_reason: impl Into<String>,
        requester_id: impl Into<String>,
        required_approvers: u32,
        ttl: Duration,
    ) -> Result<ApprovalRequest> {
        let now = Utc::now();
        let request = ApprovalRequest {
            id: Uuid::new_v4().to_string(),
            context,
            trigger_reason: trigger_reason.into(),
            required_approvers: required_approvers.max(1),
            status: ApprovalStatus::Pending,
            requester_id: requester_id.into(),
            created_at: now,
            expires_at: now + ttl,
            decisions: Vec::new(),
            version: 0,
        };

        self.store.insert(request.clone()).await?;

        tracing::info!(
            request_id = %request.id,
            requester = %request.requester_id,
            required_approvers = request.required_approvers,
            "Created approval request"
        );

        // Fire-and-forget: notification failures never fail the gate.
        if let Some(notifier) = &self.notifier {
            let notifier = notifier.clone();
            let snapshot = request.clone();
            tokio::spawn(async move {
                if let Err(e) = notifier.notify_approval_requested(&snapshot).await {
                    tracing::warn!(
                        request_id = %snapshot.id,
                        error = %e,
                        "Approval notification failed"
                    );
                }
            });
        }

        Ok(request)
    }

    /// Load a request, lazily transitioning it to EXPIRED when its TTL has
    /// elapsed.
    pub async fn get(&self, request_id: &str) -> Result<ApprovalRequest> {
        let request = self
            .store
            .get(request_id)
            .await?
            .ok_or_else(|| Error::ApprovalNotFound(request_id.to_string()))?;

        if request.status == ApprovalStatus::Pending && request.is_expired_at(Utc::now()) {
            return self.expire(request).await;
        }

        Ok(request)
    }

    /// Pending requests, with lazily expired ones filtered out.
    pub async fn list_pending(&self) -> Result<Vec<ApprovalRequest>> {
        let now = Utc::now();
        Ok(self
            .store
            .list_pending()
            .await?
            .into_iter()
            .filter(|r| !r.is_expired_at(now))
            .collect())
    }

    /// Transition stale PENDING requests to EXPIRED. Purely for reporting;
    /// `decide` is correct without it.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let stale: Vec<ApprovalRequest> = self
            .store
            .list_pending()
            .await?
            .into_iter()
            .filter(|r| r.is_expired_at(now))
            .collect();

        let mut swept = 0;
        for request in stale {
            if self.expire(request).await.is_ok() {
                swept += 1;
            }
        }

        tracing::debug!(swept = swept, "Expired stale approval requests");
        Ok(swept)
    }

    /// Record an approver's verdict.
    ///
    /// A REJECT is terminal immediately; APPROVE decisions accumulate until
    /// `required_approvers` distinct approvers have approved. Concurrent
    /// decides are serialized by the store's version check.
    pub async fn decide(
        &self,
        request_id: &str,
        approver_id: &str,
        verdict: Verdict,
        comment: Option<String>,
    ) -> Result<ApprovalRequest> {
        for _ in 0..CAS_MAX_ATTEMPTS {
            let mut request = self
                .store
                .get(request_id)
                .await?
                .ok_or_else(|| Error::ApprovalNotFound(request_id.to_string()))?;

            // Expiry outranks the terminal check: a request already moved
            // to EXPIRED reports expiry, not a prior decision.
            if request.status == ApprovalStatus::Expired {
                return Err(Error::ApprovalExpired(request_id.to_string()));
            }

            if request.status.is_terminal() {
                return Err(Error::AlreadyDecided {
                    id: request.id,
                    status: request.status.as_str().to_string(),
                });
            }

            let now = Utc::now();
            if request.is_expired_at(now) {
                self.expire(request).await?;
                return Err(Error::ApprovalExpired(request_id.to_string()));
            }

            if approver_id == request.requester_id {
                return Err(Error::SelfApprovalNotAllowed(approver_id.to_string()));
            }

            if !self
                .authorizer
                .can_decide(approver_id, &request.context.organization_id)
                .await?
            {
                return Err(Error::UnauthorizedApprover(approver_id.to_string()));
            }

            match verdict {
                Verdict::Reject => {
                    request.decisions.push(ApprovalDecision {
                        approver_id: approver_id.to_string(),
                        verdict,
                        decided_at: now,
                        comment: comment.clone(),
                    });
                    request.status = ApprovalStatus::Rejected;
                }
                Verdict::Approve => {
                    // A repeated APPROVE from the same approver is idempotent.
                    if !request.has_approved(approver_id) {
                        request.decisions.push(ApprovalDecision {
                            approver_id: approver_id.to_string(),
                            verdict,
                            decided_at: now,
                            comment: comment.clone(),
                        });
                    }
                    if request.approve_count() >= request.required_approvers as usize {
                        request.status = ApprovalStatus::Approved;
                    }
                }
            }

            if self.store.compare_and_update(request.clone()).await? {
                tracing::info!(
                    request_id = %request.id,
                    approver = approver_id,
                    verdict = ?verdict,
                    status = request.status.as_str(),
                    "Recorded approval decision"
                );
                return Ok(request);
            }
            // Lost the race; reload and retry.
        }

        Err(Error::internal(format!(
            "approval request {} under contention, giving up",
            request_id
        )))
    }

    async fn expire(&self, mut request: ApprovalRequest) -> Result<ApprovalRequest> {
        request.status = ApprovalStatus::Expired;
        // A losing CAS means someone else already transitioned it; reload.
        if !self.store.compare_and_update(request.clone()).await? {
            let current = self
                .store
                .get(&request.id)
                .await?
                .ok_or_else(|| Error::ApprovalNotFound(request.id.clone()))?;
            return Ok(current);
        }

        tracing::info!(request_id = %request.id, "Approval request expired");
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentgate_core::mocks::{AllowAllAuthorizer, CountingNotifier, StaticAuthorizer};
    use agentgate_store::InMemoryApprovalStore;

    fn manager() -> ApprovalManager {
        ApprovalManager::new(
            Arc::new(InMemoryApprovalStore::new()),
            Arc::new(AllowAllAuthorizer),
        )
    }

    fn ctx() -> TriggerContext {
        TriggerContext::new("agent-1", "org-1", "production")
    }

    #[tokio::test]
    async fn test_single_approver_flow() {
        let manager = manager();
        let request = manager
            .create(ctx(), "cost", "requester", 1, Duration::hours(1))
            .await
            .unwrap();

        let decided = manager
            .decide(&request.id, "alice", Verdict::Approve, None)
            .await
            .unwrap();
        assert_eq!(decided.status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn test_two_approvers_required() {
        let manager = manager();
        let request = manager
            .create(ctx(), "cost", "requester", 2, Duration::hours(1))
            .await
            .unwrap();

        let after_one = manager
            .decide(&request.id, "alice", Verdict::Approve, None)
            .await
            .unwrap();
        assert_eq!(after_one.status, ApprovalStatus::Pending);

        let after_two = manager
            .decide(&request.id, "bob", Verdict::Approve, None)
            .await
            .unwrap();
        assert_eq!(after_two.status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn test_duplicate_approve_counts_once() {
        let manager = manager();
        let request = manager
            .create(ctx(), "cost", "requester", 2, Duration::hours(1))
            .await
            .unwrap();

        manager
            .decide(&request.id, "alice", Verdict::Approve, None)
            .await
            .unwrap();
        let repeated = manager
            .decide(&request.id, "alice", Verdict::Approve, None)
            .await
            .unwrap();

        assert_eq!(repeated.status, ApprovalStatus::Pending);
        assert_eq!(repeated.decisions.len(), 1);
    }

    #[tokio::test]
    async fn test_single_reject_is_terminal() {
        let manager = manager();
        let request = manager
            .create(ctx(), "cost", "requester", 3, Duration::hours(1))
            .await
            .unwrap();

        let rejected = manager
            .decide(&request.id, "alice", Verdict::Reject, Some("nope".into()))
            .await
            .unwrap();
        assert_eq!(rejected.status, ApprovalStatus::Rejected);

        let err = manager
            .decide(&request.id, "bob", Verdict::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyDecided { .. }));
    }

    #[tokio::test]
    async fn test_unknown_request() {
        let err = manager()
            .decide("missing", "alice", Verdict::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ApprovalNotFound(_)));
    }

    #[tokio::test]
    async fn test_self_approval_rejected() {
        let manager = manager();
        let request = manager
            .create(ctx(), "cost", "alice", 1, Duration::hours(1))
            .await
            .unwrap();

        let err = manager
            .decide(&request.id, "alice", Verdict::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SelfApprovalNotAllowed(_)));
    }

    #[tokio::test]
    async fn test_unauthorized_approver() {
        let manager = ApprovalManager::new(
            Arc::new(InMemoryApprovalStore::new()),
            Arc::new(StaticAuthorizer::new(vec!["alice".into()])),
        );
        let request = manager
            .create(ctx(), "cost", "requester", 1, Duration::hours(1))
            .await
            .unwrap();

        let err = manager
            .decide(&request.id, "mallory", Verdict::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnauthorizedApprover(_)));

        assert!(manager
            .decide(&request.id, "alice", Verdict::Approve, None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_expired_request_transitions_lazily() {
        let manager = manager();
        let request = manager
            .create(ctx(), "cost", "requester", 1, Duration::seconds(-1))
            .await
            .unwrap();

        let err = manager
            .decide(&request.id, "alice", Verdict::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ApprovalExpired(_)));

        let stored = manager.get(&request.id).await.unwrap();
        assert_eq!(stored.status, ApprovalStatus::Expired);
    }

    #[tokio::test]
    async fn test_decide_on_already_expired_request_reports_expiry() {
        let manager = manager();
        let request = manager
            .create(ctx(), "cost", "requester", 1, Duration::seconds(-1))
            .await
            .unwrap();

        // First decide performs the lazy EXPIRED transition.
        let err = manager
            .decide(&request.id, "alice", Verdict::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ApprovalExpired(_)));

        // A later decide sees the stored EXPIRED status and still
        // reports expiry, not a prior decision.
        let err = manager
            .decide(&request.id, "bob", Verdict::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ApprovalExpired(_)));
    }

    #[tokio::test]
    async fn test_list_pending_filters_expired() {
        let manager = manager();
        manager
            .create(ctx(), "a", "requester", 1, Duration::hours(1))
            .await
            .unwrap();
        manager
            .create(ctx(), "b", "requester", 1, Duration::seconds(-1))
            .await
            .unwrap();

        assert_eq!(manager.list_pending().await.unwrap().len(), 1);
        assert_eq!(manager.sweep_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_fail_create() {
        let notifier = Arc::new(CountingNotifier::failing());
        let manager = ApprovalManager::new(
            Arc::new(InMemoryApprovalStore::new()),
            Arc::new(AllowAllAuthorizer),
        )
        .with_notifier(notifier.clone());

        let request = manager
            .create(ctx(), "cost", "requester", 1, Duration::hours(1))
            .await;
        assert!(request.is_ok());
        assert_eq!(notifier.sent(), 0);
    }

    #[tokio::test]
    async fn test_notifier_receives_new_requests() {
        let notifier = Arc::new(CountingNotifier::new());
        let manager = ApprovalManager::new(
            Arc::new(InMemoryApprovalStore::new()),
            Arc::new(AllowAllAuthorizer),
        )
        .with_notifier(notifier.clone());

        let request = manager
            .create(ctx(), "cost", "requester", 1, Duration::hours(1))
            .await
            .unwrap();

        // Notification is spawned; give it a beat.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(notifier.sent(), 1);
        assert_eq!(notifier.last_request_id(), Some(request.id));
    }
}
