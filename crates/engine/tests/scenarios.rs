use std::sync::Arc;

use rust_decimal::Decimal;

use greenlight_core::domain::actor::{ActorId, Role};
use greenlight_core::domain::request::{Level, RequestId, RequestKind, RequestStatus};
use greenlight_core::errors::{DenialReason, EngineError, TransitionError};
use greenlight_core::notify::{
    InMemoryNotificationSink, NotificationError, NotificationEvent, NotificationSink,
};
use greenlight_core::payload::RequestPayload;
use greenlight_core::resolver::ChainResolver;
use greenlight_db::repositories::{
    InMemoryRequestRepository, RepositoryError, RequestRepository, UpdateOutcome,
};
use greenlight_engine::identity::StaticRoleProvider;
use greenlight_engine::service::WorkflowService;

fn actor(id: &str) -> ActorId {
    ActorId(id.to_string())
}

fn directory() -> StaticRoleProvider {
    StaticRoleProvider::from_pairs(vec![
        (actor("emp-7"), Role::Employee),
        (actor("lead-1"), Role::TeamLeader),
        (actor("lead-2"), Role::TeamLeader),
        (actor("mgr-1"), Role::TeamManager),
        (actor("hr-1"), Role::Hr),
        (actor("fin-1"), Role::Finance),
    ])
}

struct Harness {
    service: WorkflowService,
    repo: Arc<InMemoryRequestRepository>,
    sink: InMemoryNotificationSink,
}

fn harness() -> Harness {
    let repo = Arc::new(InMemoryRequestRepository::default());
    let sink = InMemoryNotificationSink::default();
    let service = WorkflowService::new(
        repo.clone(),
        Arc::new(directory()),
        Arc::new(sink.clone()),
        ChainResolver::default(),
        2,
    );
    Harness { service, repo, sink }
}

async fn submit_permission(h: &Harness) -> RequestId {
    h.service
        .submit(RequestKind::Permission, actor("emp-7"), RequestPayload::default())
        .await
        .expect("submit permission request")
}

#[tokio::test]
async fn permission_request_starts_at_the_team_leader_level() {
    let h = harness();
    let id = submit_permission(&h).await;

    let snapshot = h.service.get_by_id(&id).await.expect("get");
    assert_eq!(snapshot.status, RequestStatus::Pending);
    assert_eq!(snapshot.current_level, Some(Level::TeamLeader));
    assert_eq!(
        snapshot.chain.iter().map(|s| s.level).collect::<Vec<_>>(),
        vec![Level::TeamLeader, Level::TeamManager, Level::Hr]
    );
    assert!(snapshot.history.is_empty());
}

#[tokio::test]
async fn wrong_role_at_the_active_level_is_denied_and_mutates_nothing() {
    let h = harness();
    let id = submit_permission(&h).await;

    let before = h.service.get_by_id(&id).await.expect("get");
    // A team manager has no business acting at the leader step, no matter
    // how often they retry.
    for _ in 0..3 {
        let error = h
            .service
            .approve(&id, actor("mgr-1"), Level::TeamLeader, None)
            .await
            .expect_err("wrong role");
        assert!(matches!(
            error,
            EngineError::Unauthorized(DenialReason::RoleNotPermitted { .. })
        ));
    }
    let after = h.service.get_by_id(&id).await.expect("get");
    assert_eq!(after, before);
}

#[tokio::test]
async fn approvals_walk_the_chain_and_rejection_cuts_it_short() {
    let h = harness();
    let id = submit_permission(&h).await;

    let snapshot = h
        .service
        .approve(&id, actor("lead-1"), Level::TeamLeader, None)
        .await
        .expect("leader approval");
    assert_eq!(snapshot.status, RequestStatus::Pending);
    assert_eq!(snapshot.current_level, Some(Level::TeamManager));
    assert_eq!(snapshot.history.len(), 1);

    let snapshot = h
        .service
        .reject(&id, actor("mgr-1"), Level::TeamManager, "insufficient coverage".to_string())
        .await
        .expect("manager rejection");
    assert_eq!(snapshot.status, RequestStatus::Rejected);
    assert!(snapshot.finalized_at.is_some());
    assert_eq!(snapshot.history.len(), 2);
    // The HR step was never visited.
    assert!(snapshot.history.iter().all(|d| d.level != Level::Hr));
}

#[tokio::test]
async fn rejected_requests_accept_no_further_decisions() {
    let h = harness();
    let id = submit_permission(&h).await;

    h.service
        .approve(&id, actor("lead-1"), Level::TeamLeader, None)
        .await
        .expect("leader approval");
    h.service
        .reject(&id, actor("mgr-1"), Level::TeamManager, "no".to_string())
        .await
        .expect("rejection");

    let error = h
        .service
        .approve(&id, actor("hr-1"), Level::Hr, None)
        .await
        .expect_err("terminal");
    assert!(matches!(
        error,
        EngineError::Unauthorized(DenialReason::Terminal)
    ));

    let snapshot = h.service.get_by_id(&id).await.expect("get");
    assert_eq!(snapshot.history.len(), 2);
}

#[tokio::test]
async fn requesters_can_never_decide_their_own_request() {
    let h = harness();
    // emp-7's own requests are out of their reach even if their role were
    // to match the step.
    let id = submit_permission(&h).await;
    let error = h
        .service
        .approve(&id, actor("emp-7"), Level::TeamLeader, None)
        .await
        .expect_err("self approval");
    assert!(matches!(
        error,
        EngineError::Unauthorized(DenialReason::SelfApproval)
    ));

    let snapshot = h.service.get_by_id(&id).await.expect("get");
    assert!(snapshot.history.iter().all(|d| d.actor.id != actor("emp-7")));
}

#[tokio::test]
async fn blank_rejection_reason_is_rejected_up_front() {
    let h = harness();
    let id = submit_permission(&h).await;

    let error = h
        .service
        .reject(&id, actor("lead-1"), Level::TeamLeader, "  ".to_string())
        .await
        .expect_err("blank reason");
    assert!(matches!(error, EngineError::Validation(_)));

    let snapshot = h.service.get_by_id(&id).await.expect("get");
    assert_eq!(snapshot.status, RequestStatus::Pending);
    assert!(snapshot.history.is_empty());
}

#[tokio::test]
async fn large_travel_reimbursement_runs_manager_hr_finance_then_payout() {
    let h = harness();
    let mut payload = RequestPayload::with_amount(Decimal::new(30_000, 0));
    payload.category = Some("Travel".to_string());

    let id = h
        .service
        .submit(RequestKind::Reimbursement, actor("emp-7"), payload)
        .await
        .expect("submit reimbursement");

    let snapshot = h.service.get_by_id(&id).await.expect("get");
    assert_eq!(
        snapshot.chain.iter().map(|s| s.level).collect::<Vec<_>>(),
        vec![Level::Manager, Level::Hr, Level::Finance]
    );

    h.service
        .approve(&id, actor("mgr-1"), Level::Manager, None)
        .await
        .expect("manager approval");
    h.service.approve(&id, actor("hr-1"), Level::Hr, None).await.expect("hr approval");
    let approved = h
        .service
        .approve(&id, actor("fin-1"), Level::Finance, None)
        .await
        .expect("finance approval");
    assert_eq!(approved.status, RequestStatus::Approved);
    assert!(!approved.paid);

    // Payout is bookkeeping: chain and history stay as the approvals left
    // them and the chain is byte-for-byte what submission resolved.
    let paid = h.service.mark_paid(&id, actor("fin-1")).await.expect("mark paid");
    assert!(paid.paid);
    assert_eq!(paid.status, RequestStatus::Approved);
    assert_eq!(paid.chain, snapshot.chain);
    assert_eq!(paid.history.len(), 3);

    let error = h
        .service
        .mark_paid(&id, actor("mgr-1"))
        .await
        .expect_err("payout is finance-only");
    assert!(matches!(error, EngineError::Unauthorized(_)));
}

#[tokio::test]
async fn concurrent_approvals_at_the_same_level_admit_exactly_one() {
    let h = harness();
    let id = submit_permission(&h).await;

    let first = h.service.approve(&id, actor("lead-1"), Level::TeamLeader, None);
    let second = h.service.approve(&id, actor("lead-2"), Level::TeamLeader, None);
    let (first, second) = tokio::join!(first, second);

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);

    let loser = outcomes.iter().find(|r| r.is_err()).expect("one failure");
    assert!(matches!(
        loser,
        Err(EngineError::Transition(TransitionError::StaleLevel {
            proposed: Level::TeamLeader,
            active: Level::TeamManager,
        }))
    ));

    let snapshot = h.service.get_by_id(&id).await.expect("get");
    assert_eq!(snapshot.history.len(), 1);
    assert_eq!(snapshot.current_level, Some(Level::TeamManager));
}

/// Repository whose conditional writes always lose, as if another writer
/// kept slipping in between every read and write.
struct AlwaysConflicting {
    inner: InMemoryRequestRepository,
}

#[async_trait::async_trait]
impl RequestRepository for AlwaysConflicting {
    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<greenlight_core::domain::request::ApprovalRequest>, RepositoryError> {
        self.inner.find_by_id(id).await
    }

    async fn insert(
        &self,
        request: &greenlight_core::domain::request::ApprovalRequest,
    ) -> Result<(), RepositoryError> {
        self.inner.insert(request).await
    }

    async fn update(
        &self,
        _request: &greenlight_core::domain::request::ApprovalRequest,
        _expected_version: u64,
    ) -> Result<UpdateOutcome, RepositoryError> {
        Ok(UpdateOutcome::VersionConflict)
    }

    async fn list_for_requester(
        &self,
        requester: &ActorId,
    ) -> Result<Vec<greenlight_core::domain::request::ApprovalRequest>, RepositoryError> {
        self.inner.list_for_requester(requester).await
    }

    async fn list_pending(
        &self,
    ) -> Result<Vec<greenlight_core::domain::request::ApprovalRequest>, RepositoryError> {
        self.inner.list_pending().await
    }
}

#[tokio::test]
async fn retries_are_bounded_before_surfacing_the_conflict() {
    let repo = Arc::new(AlwaysConflicting { inner: InMemoryRequestRepository::default() });
    let service = WorkflowService::new(
        repo,
        Arc::new(directory()),
        Arc::new(InMemoryNotificationSink::default()),
        ChainResolver::default(),
        2,
    );

    let id = service
        .submit(RequestKind::Permission, actor("emp-7"), RequestPayload::default())
        .await
        .expect("submit");

    let error = service
        .approve(&id, actor("lead-1"), Level::TeamLeader, None)
        .await
        .expect_err("conflict");
    assert!(matches!(error, EngineError::ConcurrentModification(_)));
}

#[tokio::test]
async fn notifications_follow_every_transition_with_the_next_role_set() {
    let h = harness();
    let id = submit_permission(&h).await;
    h.service
        .approve(&id, actor("lead-1"), Level::TeamLeader, None)
        .await
        .expect("leader approval");

    let events = h.sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].status, RequestStatus::Pending);
    assert_eq!(events[0].notify_roles, vec![Role::TeamLeader]);
    assert_eq!(events[1].notify_roles, vec![Role::TeamManager]);
}

struct DeadLetterSink;

impl NotificationSink for DeadLetterSink {
    fn deliver(&self, _event: NotificationEvent) -> Result<(), NotificationError> {
        Err(NotificationError::Delivery("sink offline".to_string()))
    }
}

#[tokio::test]
async fn notification_failures_never_fail_the_transition() {
    let repo = Arc::new(InMemoryRequestRepository::default());
    let service = WorkflowService::new(
        repo,
        Arc::new(directory()),
        Arc::new(DeadLetterSink),
        ChainResolver::default(),
        2,
    );

    let id = service
        .submit(RequestKind::Permission, actor("emp-7"), RequestPayload::default())
        .await
        .expect("submit despite dead sink");
    let snapshot = service
        .approve(&id, actor("lead-1"), Level::TeamLeader, None)
        .await
        .expect("approve despite dead sink");
    assert_eq!(snapshot.history.len(), 1);
}

#[tokio::test]
async fn cancellation_is_requester_only_and_terminal() {
    let h = harness();
    let id = submit_permission(&h).await;

    let error = h
        .service
        .cancel(&id, actor("mgr-1"))
        .await
        .expect_err("not the requester");
    assert!(matches!(
        error,
        EngineError::Transition(TransitionError::NotRequester)
    ));

    let snapshot = h.service.cancel(&id, actor("emp-7")).await.expect("cancel");
    assert_eq!(snapshot.status, RequestStatus::Cancelled);

    let error = h
        .service
        .approve(&id, actor("lead-1"), Level::TeamLeader, None)
        .await
        .expect_err("terminal");
    assert!(matches!(
        error,
        EngineError::Unauthorized(DenialReason::Terminal)
    ));
}

#[tokio::test]
async fn resubmission_creates_a_new_request_referencing_the_rejected_one() {
    let h = harness();
    let id = submit_permission(&h).await;
    h.service
        .reject(&id, actor("lead-1"), Level::TeamLeader, "dates clash".to_string())
        .await
        .expect("rejection");

    // Only the original requester may resubmit, and only after rejection.
    let error = h
        .service
        .resubmit(&id, actor("mgr-1"), RequestPayload::default())
        .await
        .expect_err("wrong requester");
    assert!(matches!(
        error,
        EngineError::Transition(TransitionError::NotRequester)
    ));

    let new_id = h
        .service
        .resubmit(&id, actor("emp-7"), RequestPayload::default())
        .await
        .expect("resubmit");
    assert_ne!(new_id, id);

    let old = h.service.get_by_id(&id).await.expect("get old");
    assert_eq!(old.status, RequestStatus::Rejected);
    assert_eq!(old.history.len(), 1);

    let new = h.service.get_by_id(&new_id).await.expect("get new");
    assert_eq!(new.status, RequestStatus::Pending);
    assert_eq!(new.resubmission_of, Some(id));
    assert!(new.history.is_empty());
}

#[tokio::test]
async fn resubmitting_a_non_rejected_request_is_an_invalid_state() {
    let h = harness();
    let id = submit_permission(&h).await;

    let error = h
        .service
        .resubmit(&id, actor("emp-7"), RequestPayload::default())
        .await
        .expect_err("still pending");
    assert!(matches!(
        error,
        EngineError::Transition(TransitionError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn unknown_actors_and_unknown_requests_get_typed_errors() {
    let h = harness();

    let error = h
        .service
        .submit(RequestKind::Permission, actor("ghost"), RequestPayload::default())
        .await
        .expect_err("unknown actor");
    assert!(matches!(error, EngineError::UnknownActor(_)));

    let error = h
        .service
        .get_by_id(&RequestId("nope".to_string()))
        .await
        .expect_err("unknown request");
    assert!(matches!(error, EngineError::NotFound(_)));
}

#[tokio::test]
async fn lead_level_requester_skips_the_leader_step_end_to_end() {
    let repo = Arc::new(InMemoryRequestRepository::default());
    let service = WorkflowService::new(
        repo.clone(),
        Arc::new(directory()),
        Arc::new(InMemoryNotificationSink::default()),
        ChainResolver::default(),
        2,
    );

    let id = service
        .submit(RequestKind::Permission, actor("lead-1"), RequestPayload::default())
        .await
        .expect("submit as team leader");

    let snapshot = service.get_by_id(&id).await.expect("get");
    assert_eq!(
        snapshot.chain.iter().map(|s| s.level).collect::<Vec<_>>(),
        vec![Level::TeamManager, Level::Hr]
    );

    let record = repo.find_by_id(&id).await.expect("find").expect("exists");
    let chain_before = record.chain.clone();
    service
        .approve(&id, actor("mgr-1"), Level::TeamManager, None)
        .await
        .expect("manager approval");
    let record = repo.find_by_id(&id).await.expect("find").expect("exists");
    assert_eq!(record.chain, chain_before);
}
