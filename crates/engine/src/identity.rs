use std::collections::HashMap;

use greenlight_core::domain::actor::{ActorId, Role};

/// Identity collaborator: maps an actor to their current role.
///
/// Consulted at call time for every operation; the engine never caches the
/// answer. History keeps the role as it was observed when a decision was
/// recorded, so later role changes do not rewrite the past.
pub trait RoleProvider: Send + Sync {
    fn role_of(&self, actor: &ActorId) -> Option<Role>;
}

#[derive(Clone, Debug, Default)]
pub struct StaticRoleProvider {
    roles: HashMap<String, Role>,
}

impl StaticRoleProvider {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (ActorId, Role)>) -> Self {
        Self { roles: pairs.into_iter().map(|(id, role)| (id.0, role)).collect() }
    }

    pub fn assign(&mut self, actor: ActorId, role: Role) {
        self.roles.insert(actor.0, role);
    }
}

impl RoleProvider for StaticRoleProvider {
    fn role_of(&self, actor: &ActorId) -> Option<Role> {
        self.roles.get(&actor.0).copied()
    }
}
