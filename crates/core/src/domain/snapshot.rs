use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::actor::ActorId;
use crate::domain::request::{
    ApprovalRequest, ApprovalStep, Decision, Level, RequestId, RequestKind, RequestStatus,
};
use crate::payload::RequestPayload;

/// Serializable projection of a request, the shape every read and every
/// successful mutation hands back to callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub id: RequestId,
    pub kind: RequestKind,
    pub requester: ActorId,
    pub status: RequestStatus,
    pub current_level: Option<Level>,
    pub chain: Vec<ApprovalStep>,
    pub history: Vec<Decision>,
    pub payload: RequestPayload,
    pub paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resubmission_of: Option<RequestId>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl From<&ApprovalRequest> for RequestSnapshot {
    fn from(request: &ApprovalRequest) -> Self {
        Self {
            id: request.id.clone(),
            kind: request.kind,
            requester: request.requester.clone(),
            status: request.status,
            current_level: request.current_level(),
            chain: request.chain.clone(),
            history: request.history.clone(),
            payload: request.payload.clone(),
            paid: request.paid,
            resubmission_of: request.resubmission_of.clone(),
            version: request.version,
            created_at: request.created_at,
            submitted_at: request.submitted_at,
            finalized_at: request.finalized_at,
        }
    }
}
