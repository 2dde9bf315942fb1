use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Organizational role an actor holds at the time an operation is attempted.
///
/// Roles are a closed set; approval chains reference them through
/// [`super::request::ApprovalStep::required_roles`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employee,
    TeamLeader,
    TeamManager,
    Hr,
    Finance,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "employee" => Some(Self::Employee),
            "team_leader" => Some(Self::TeamLeader),
            "team_manager" => Some(Self::TeamManager),
            "hr" => Some(Self::Hr),
            "finance" => Some(Self::Finance),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::TeamLeader => "team_leader",
            Self::TeamManager => "team_manager",
            Self::Hr => "hr",
            Self::Finance => "finance",
        }
    }
}

/// Identity plus role as observed when a decision was recorded.
///
/// The role is captured into history at decision time and never refreshed,
/// even if the identity provider later reports a different role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionActor {
    pub id: ActorId,
    pub role: Role,
}
