use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::actor::{ActorId, DecisionActor, Role};
use crate::errors::{EngineError, TransitionError, ValidationError};
use crate::payload::RequestPayload;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Permission,
    Regularization,
    Reimbursement,
}

impl RequestKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "permission" => Some(Self::Permission),
            "regularization" => Some(Self::Regularization),
            "reimbursement" => Some(Self::Reimbursement),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permission => "permission",
            Self::Regularization => "regularization",
            Self::Reimbursement => "reimbursement",
        }
    }
}

/// A position in an approval chain. Levels are labels, not roles: two
/// distinct levels may be satisfiable by the same role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    TeamLeader,
    TeamManager,
    Manager,
    Hr,
    Finance,
}

impl Level {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TeamLeader => "team_leader",
            Self::TeamManager => "team_manager",
            Self::Manager => "manager",
            Self::Hr => "hr",
            Self::Finance => "finance",
        }
    }
}

/// One link in a resolved chain: the level label and the roles any one of
/// which may act for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub level: Level,
    pub required_roles: Vec<Role>,
}

impl ApprovalStep {
    pub fn new(level: Level, required_roles: Vec<Role>) -> Self {
        Self { level, required_roles }
    }

    pub fn permits(&self, role: Role) -> bool {
        self.required_roles.contains(&role)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Approved,
    Rejected,
}

/// Immutable record of one approve/reject action at one level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub level: Level,
    pub actor: DecisionActor,
    pub action: DecisionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Cancelled)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// The persisted request record.
///
/// `(status, current_index, chain)` is the single source of truth for where
/// the request stands; display labels are derived from it, never stored.
/// `history` is append-only, `chain` is frozen once `submit` succeeds, and
/// `version` is the optimistic-concurrency token bumped by every successful
/// transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: RequestId,
    pub kind: RequestKind,
    pub requester: ActorId,
    pub payload: RequestPayload,
    pub chain: Vec<ApprovalStep>,
    pub current_index: Option<usize>,
    pub status: RequestStatus,
    pub history: Vec<Decision>,
    pub paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resubmission_of: Option<RequestId>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<DateTime<Utc>>,
}

impl ApprovalRequest {
    pub fn new_draft(
        kind: RequestKind,
        requester: ActorId,
        payload: RequestPayload,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RequestId::generate(),
            kind,
            requester,
            payload,
            chain: Vec::new(),
            current_index: None,
            status: RequestStatus::Draft,
            history: Vec::new(),
            paid: false,
            resubmission_of: None,
            version: 0,
            created_at: now,
            submitted_at: None,
            finalized_at: None,
        }
    }

    /// The step the request is currently waiting on, if any.
    pub fn active_step(&self) -> Option<&ApprovalStep> {
        if self.status != RequestStatus::Pending {
            return None;
        }
        self.current_index.and_then(|i| self.chain.get(i))
    }

    pub fn current_level(&self) -> Option<Level> {
        self.active_step().map(|step| step.level)
    }

    /// Roles responsible for the request in its current state. Empty once
    /// terminal; used to address outbound notifications.
    pub fn responsible_roles(&self) -> Vec<Role> {
        self.active_step().map(|step| step.required_roles.clone()).unwrap_or_default()
    }

    /// Freeze the resolved chain and move out of `Draft`.
    ///
    /// A chain that resolved to no applicable approver finalizes the
    /// request as `Approved` on the spot; that outcome is deliberate and
    /// visible in the returned status, never inferred later.
    pub fn submit(
        &mut self,
        chain: Vec<ApprovalStep>,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if self.status != RequestStatus::Draft {
            return Err(TransitionError::InvalidState { status: self.status }.into());
        }
        for step in &chain {
            if step.required_roles.is_empty() {
                return Err(ValidationError::EmptyRequiredRoles { level: step.level }.into());
            }
        }

        self.submitted_at = Some(now);
        if chain.is_empty() {
            self.chain = chain;
            self.status = RequestStatus::Approved;
            self.finalized_at = Some(now);
        } else {
            self.chain = chain;
            self.current_index = Some(0);
            self.status = RequestStatus::Pending;
        }
        self.version += 1;
        Ok(())
    }

    /// Record an approval at `level` and advance, finalizing on the last
    /// step. The proposed level must still be the active one.
    pub fn approve(
        &mut self,
        level: Level,
        actor: DecisionActor,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let active = self.require_active_level()?;
        if level != active {
            return Err(TransitionError::StaleLevel { proposed: level, active }.into());
        }

        self.history.push(Decision {
            level,
            actor,
            action: DecisionAction::Approved,
            comments,
            decided_at: now,
        });

        let index = self.current_index.unwrap_or(0);
        if index + 1 == self.chain.len() {
            self.status = RequestStatus::Approved;
            self.finalized_at = Some(now);
        } else {
            self.current_index = Some(index + 1);
        }
        self.version += 1;
        Ok(())
    }

    /// Record a rejection at `level`. Rejection is absorbing: later levels
    /// are never visited and no further decision is ever appended.
    pub fn reject(
        &mut self,
        level: Level,
        actor: DecisionActor,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if reason.trim().is_empty() {
            return Err(ValidationError::BlankRejectReason.into());
        }
        let active = self.require_active_level()?;
        if level != active {
            return Err(TransitionError::StaleLevel { proposed: level, active }.into());
        }

        self.history.push(Decision {
            level,
            actor,
            action: DecisionAction::Rejected,
            comments: Some(reason),
            decided_at: now,
        });
        self.status = RequestStatus::Rejected;
        self.finalized_at = Some(now);
        self.version += 1;
        Ok(())
    }

    /// Withdraw a non-terminal request. Only the original requester may do
    /// this; cancellation appends no decision.
    pub fn cancel(&mut self, actor: &ActorId, now: DateTime<Utc>) -> Result<(), EngineError> {
        if self.status.is_terminal() {
            return Err(TransitionError::InvalidState { status: self.status }.into());
        }
        if actor != &self.requester {
            return Err(TransitionError::NotRequester.into());
        }

        self.status = RequestStatus::Cancelled;
        self.finalized_at = Some(now);
        self.version += 1;
        Ok(())
    }

    /// Set the payout marker on an approved reimbursement. Bookkeeping
    /// only: the chain and history stay exactly as the approvals left them.
    /// Other kinds have no fulfillment step and never carry the marker.
    pub fn mark_paid(&mut self) -> Result<(), EngineError> {
        if self.kind != RequestKind::Reimbursement {
            return Err(TransitionError::PayoutUnsupported { kind: self.kind }.into());
        }
        if self.status != RequestStatus::Approved {
            return Err(TransitionError::InvalidState { status: self.status }.into());
        }
        self.paid = true;
        self.version += 1;
        Ok(())
    }

    fn require_active_level(&self) -> Result<Level, TransitionError> {
        self.current_level().ok_or(TransitionError::InvalidState { status: self.status })
    }
}
