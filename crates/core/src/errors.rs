use thiserror::Error;

use crate::domain::request::{Level, RequestKind, RequestStatus};

/// Input problems caught before any state is touched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("reject requires a non-blank reason")]
    BlankRejectReason,
    #[error("reimbursement requests require an amount")]
    MissingAmount,
    #[error("approval step for level {level:?} has no required roles")]
    EmptyRequiredRoles { level: Level },
}

/// Operation not legal from the record's current position.
///
/// A failed transition leaves the record untouched; there is no partial
/// application.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("operation not valid while request is {status:?}")]
    InvalidState { status: RequestStatus },
    #[error("level {proposed:?} is no longer active, current level is {active:?}")]
    StaleLevel { proposed: Level, active: Level },
    #[error("only the requester may cancel their own request")]
    NotRequester,
    #[error("payout marker applies to reimbursements only, not {kind:?}")]
    PayoutUnsupported { kind: RequestKind },
}

/// Exactly one reason is attributed to every gate denial.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DenialReason {
    #[error("request is terminal and accepts no further action")]
    Terminal,
    #[error("requesters may not act on their own request")]
    SelfApproval,
    #[error("level {proposed:?} is not the active level {active:?}")]
    StaleLevel { proposed: Level, active: Level },
    #[error("role {role} is not permitted to act at level {level:?}")]
    RoleNotPermitted { role: &'static str, level: Level },
}

/// Service-level error surface for every engine operation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("request not found: {0}")]
    NotFound(String),
    #[error("actor not known to the identity provider: {0}")]
    UnknownActor(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("unauthorized: {0}")]
    Unauthorized(DenialReason),
    #[error("request {0} was modified concurrently, re-fetch and retry")]
    ConcurrentModification(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<DenialReason> for EngineError {
    /// A stale-level denial means the record legitimately moved on, which
    /// callers handle like any other invalid transition. The remaining
    /// reasons are authorization failures.
    fn from(reason: DenialReason) -> Self {
        match reason {
            DenialReason::StaleLevel { proposed, active } => {
                Self::Transition(TransitionError::StaleLevel { proposed, active })
            }
            other => Self::Unauthorized(other),
        }
    }
}
