use crate::domain::actor::{ActorId, Role};
use crate::domain::request::{ApprovalRequest, Level};
use crate::errors::DenialReason;

/// The single authorization check for approve/reject actions.
///
/// Checks run in a fixed order so every denial is attributable to exactly
/// one reason: terminal record, self-approval, stale level, then role
/// membership against the active step. Drafts pass through; the record
/// transition reports those as an invalid state rather than a denial.
#[derive(Clone, Copy, Debug, Default)]
pub struct Gate;

impl Gate {
    pub fn can_act(
        actor: &ActorId,
        role: Role,
        request: &ApprovalRequest,
        proposed_level: Level,
    ) -> Result<(), DenialReason> {
        if request.status.is_terminal() {
            return Err(DenialReason::Terminal);
        }
        if actor == &request.requester {
            return Err(DenialReason::SelfApproval);
        }

        let Some(step) = request.active_step() else {
            return Ok(());
        };
        if proposed_level != step.level {
            return Err(DenialReason::StaleLevel { proposed: proposed_level, active: step.level });
        }
        if !step.permits(role) {
            return Err(DenialReason::RoleNotPermitted {
                role: role.as_str(),
                level: step.level,
            });
        }
        Ok(())
    }
}
