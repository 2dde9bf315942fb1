use std::sync::Arc;

use chrono::Utc;

use greenlight_core::domain::actor::{ActorId, DecisionActor, Role};
use greenlight_core::domain::request::{
    ApprovalRequest, Level, RequestId, RequestKind, RequestStatus,
};
use greenlight_core::domain::snapshot::RequestSnapshot;
use greenlight_core::errors::{DenialReason, EngineError, TransitionError};
use greenlight_core::gate::Gate;
use greenlight_core::notify::{NotificationEvent, NotificationSink};
use greenlight_core::payload::RequestPayload;
use greenlight_core::resolver::ChainResolver;
use greenlight_db::repositories::{RepositoryError, RequestRepository, UpdateOutcome};

use crate::identity::RoleProvider;

/// The workflow controller. Pure coordination: every operation loads the
/// record, consults the gate where applicable, asks the record to
/// transition, writes back under the version guard and emits a
/// notification. Business rules live in the resolver, the gate and the
/// record itself.
pub struct WorkflowService {
    repo: Arc<dyn RequestRepository>,
    roles: Arc<dyn RoleProvider>,
    sink: Arc<dyn NotificationSink>,
    resolver: ChainResolver,
    max_retries: u32,
}

impl WorkflowService {
    pub fn new(
        repo: Arc<dyn RequestRepository>,
        roles: Arc<dyn RoleProvider>,
        sink: Arc<dyn NotificationSink>,
        resolver: ChainResolver,
        max_retries: u32,
    ) -> Self {
        Self { repo, roles, sink, resolver, max_retries }
    }

    /// Create and submit a request in one step. The chain is resolved
    /// here, once, and frozen into the record.
    pub async fn submit(
        &self,
        kind: RequestKind,
        requester: ActorId,
        payload: RequestPayload,
    ) -> Result<RequestId, EngineError> {
        self.submit_inner(kind, requester, payload, None).await
    }

    /// Submit a fresh request referencing a rejected predecessor. The old
    /// record stays untouched; the new one gets a newly resolved chain.
    pub async fn resubmit(
        &self,
        prior_id: &RequestId,
        requester: ActorId,
        payload: RequestPayload,
    ) -> Result<RequestId, EngineError> {
        let prior = self.load(prior_id).await?;
        if prior.status != RequestStatus::Rejected {
            return Err(TransitionError::InvalidState { status: prior.status }.into());
        }
        if prior.requester != requester {
            return Err(TransitionError::NotRequester.into());
        }
        self.submit_inner(prior.kind, requester, payload, Some(prior.id)).await
    }

    async fn submit_inner(
        &self,
        kind: RequestKind,
        requester: ActorId,
        payload: RequestPayload,
        resubmission_of: Option<RequestId>,
    ) -> Result<RequestId, EngineError> {
        let requester_role = self.role_of(&requester)?;
        let chain = self.resolver.resolve(kind, requester_role, &payload)?;

        let now = Utc::now();
        let mut record = ApprovalRequest::new_draft(kind, requester, payload, now);
        record.resubmission_of = resubmission_of;
        record.submit(chain, now)?;

        self.repo.insert(&record).await.map_err(persistence)?;
        tracing::info!(
            event_name = "workflow.request_submitted",
            request_id = %record.id.as_str(),
            kind = kind.as_str(),
            status = record.status.as_str(),
            chain_len = record.chain.len(),
            "request submitted"
        );
        self.notify(&record);
        Ok(record.id)
    }

    pub async fn approve(
        &self,
        request_id: &RequestId,
        actor: ActorId,
        level: Level,
        comments: Option<String>,
    ) -> Result<RequestSnapshot, EngineError> {
        let role = self.role_of(&actor)?;
        let record = self
            .apply(request_id, "workflow.request_approved", |record| {
                Gate::can_act(&actor, role, record, level).map_err(EngineError::from)?;
                record.approve(
                    level,
                    DecisionActor { id: actor.clone(), role },
                    comments.clone(),
                    Utc::now(),
                )
            })
            .await?;
        Ok(RequestSnapshot::from(&record))
    }

    pub async fn reject(
        &self,
        request_id: &RequestId,
        actor: ActorId,
        level: Level,
        reason: String,
    ) -> Result<RequestSnapshot, EngineError> {
        let role = self.role_of(&actor)?;
        let record = self
            .apply(request_id, "workflow.request_rejected", |record| {
                Gate::can_act(&actor, role, record, level).map_err(EngineError::from)?;
                record.reject(
                    level,
                    DecisionActor { id: actor.clone(), role },
                    reason.clone(),
                    Utc::now(),
                )
            })
            .await?;
        Ok(RequestSnapshot::from(&record))
    }

    pub async fn cancel(
        &self,
        request_id: &RequestId,
        actor: ActorId,
    ) -> Result<RequestSnapshot, EngineError> {
        let record = self
            .apply(request_id, "workflow.request_cancelled", |record| {
                record.cancel(&actor, Utc::now())
            })
            .await?;
        Ok(RequestSnapshot::from(&record))
    }

    /// Post-approval payout bookkeeping for reimbursements. Outside the
    /// approval chain, but still restricted to the finance role and to
    /// records that are already approved.
    pub async fn mark_paid(
        &self,
        request_id: &RequestId,
        actor: ActorId,
    ) -> Result<RequestSnapshot, EngineError> {
        let role = self.role_of(&actor)?;
        if role != Role::Finance {
            return Err(EngineError::Unauthorized(DenialReason::RoleNotPermitted {
                role: role.as_str(),
                level: Level::Finance,
            }));
        }

        let record = self
            .apply(request_id, "workflow.request_paid", |record| record.mark_paid())
            .await?;
        Ok(RequestSnapshot::from(&record))
    }

    pub async fn get_by_id(
        &self,
        request_id: &RequestId,
    ) -> Result<RequestSnapshot, EngineError> {
        let record = self.load(request_id).await?;
        Ok(RequestSnapshot::from(&record))
    }

    /// Load, mutate and write back under the version guard. On a conflict
    /// the whole read-check-write cycle is retried against the refreshed
    /// record, a bounded number of times.
    async fn apply<F>(
        &self,
        request_id: &RequestId,
        event_name: &'static str,
        mutate: F,
    ) -> Result<ApprovalRequest, EngineError>
    where
        F: Fn(&mut ApprovalRequest) -> Result<(), EngineError>,
    {
        let mut attempts = 0;
        loop {
            let mut record = self.load(request_id).await?;
            let read_version = record.version;
            mutate(&mut record)?;

            match self.repo.update(&record, read_version).await.map_err(persistence)? {
                UpdateOutcome::Applied => {
                    tracing::info!(
                        event_name,
                        request_id = %record.id.as_str(),
                        status = record.status.as_str(),
                        history_len = record.history.len(),
                        "transition applied"
                    );
                    self.notify(&record);
                    return Ok(record);
                }
                UpdateOutcome::VersionConflict => {
                    attempts += 1;
                    if attempts > self.max_retries {
                        return Err(EngineError::ConcurrentModification(
                            request_id.as_str().to_string(),
                        ));
                    }
                    tracing::debug!(
                        event_name = "workflow.version_conflict_retry",
                        request_id = %request_id.as_str(),
                        attempt = attempts,
                        "version conflict, retrying from a fresh read"
                    );
                }
            }
        }
    }

    async fn load(&self, request_id: &RequestId) -> Result<ApprovalRequest, EngineError> {
        self.repo
            .find_by_id(request_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| EngineError::NotFound(request_id.as_str().to_string()))
    }

    fn role_of(&self, actor: &ActorId) -> Result<Role, EngineError> {
        self.roles
            .role_of(actor)
            .ok_or_else(|| EngineError::UnknownActor(actor.as_str().to_string()))
    }

    /// Fire-and-forget. The persisted transition is the authoritative
    /// fact; a delivery failure is logged and never unwinds it.
    fn notify(&self, record: &ApprovalRequest) {
        let event = NotificationEvent::new(
            record.id.clone(),
            record.kind,
            record.status,
            record.responsible_roles(),
        );
        if let Err(error) = self.sink.deliver(event) {
            tracing::warn!(
                event_name = "workflow.notification_failed",
                request_id = %record.id.as_str(),
                error = %error,
                "notification delivery failed, transition remains recorded"
            );
        }
    }
}

fn persistence(error: RepositoryError) -> EngineError {
    EngineError::Persistence(error.to_string())
}
