use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::actor::Role;
use crate::domain::request::{ApprovalStep, Level, RequestKind};
use crate::errors::ValidationError;
use crate::payload::RequestPayload;

/// Table-driven routing policy consumed by the resolver.
///
/// Thresholds and category/subtype sets come from configuration so kinds
/// can be re-tuned without touching control flow. Changing the policy only
/// affects requests submitted afterwards; in-flight chains are frozen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Roles that already sit at team-lead level and therefore skip the
    /// `TeamLeader` step on their own permission requests.
    pub lead_equivalent_roles: Vec<Role>,
    /// Regularization subtypes that go straight to HR without line-manager
    /// sign-off.
    pub hr_only_regularization_subtypes: Vec<String>,
    /// Reimbursement amount above which an HR review step is added.
    pub hr_review_threshold: Decimal,
    /// Reimbursement amount above which a finance review step is added.
    pub finance_review_threshold: Decimal,
    /// Reimbursement categories that always get an HR review step.
    pub sensitive_categories: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            lead_equivalent_roles: vec![Role::TeamLeader, Role::TeamManager],
            hr_only_regularization_subtypes: vec!["timeclock_correction".to_string()],
            hr_review_threshold: Decimal::new(5_000, 0),
            finance_review_threshold: Decimal::new(20_000, 0),
            sensitive_categories: vec!["medical".to_string(), "training".to_string()],
        }
    }
}

/// Pure, deterministic chain computation. Evaluated exactly once, at
/// submission; the result is frozen into the record.
#[derive(Clone, Debug, Default)]
pub struct ChainResolver {
    policy: PolicyConfig,
}

impl ChainResolver {
    pub fn new(policy: PolicyConfig) -> Self {
        Self { policy }
    }

    pub fn resolve(
        &self,
        kind: RequestKind,
        requester_role: Role,
        payload: &RequestPayload,
    ) -> Result<Vec<ApprovalStep>, ValidationError> {
        match kind {
            RequestKind::Permission => Ok(self.permission_chain(requester_role)),
            RequestKind::Regularization => Ok(self.regularization_chain(payload)),
            RequestKind::Reimbursement => self.reimbursement_chain(payload),
        }
    }

    fn permission_chain(&self, requester_role: Role) -> Vec<ApprovalStep> {
        let mut chain = Vec::with_capacity(3);
        if !self.policy.lead_equivalent_roles.contains(&requester_role) {
            chain.push(ApprovalStep::new(Level::TeamLeader, vec![Role::TeamLeader]));
        }
        chain.push(ApprovalStep::new(Level::TeamManager, vec![Role::TeamManager]));
        chain.push(ApprovalStep::new(Level::Hr, vec![Role::Hr]));
        chain
    }

    fn regularization_chain(&self, payload: &RequestPayload) -> Vec<ApprovalStep> {
        let hr_only = payload.subtype.as_deref().is_some_and(|subtype| {
            self.policy
                .hr_only_regularization_subtypes
                .iter()
                .any(|candidate| normalize_key(candidate) == normalize_key(subtype))
        });

        let mut chain = Vec::with_capacity(2);
        if !hr_only {
            chain.push(ApprovalStep::new(Level::TeamManager, vec![Role::TeamManager]));
        }
        chain.push(ApprovalStep::new(Level::Hr, vec![Role::Hr]));
        chain
    }

    fn reimbursement_chain(
        &self,
        payload: &RequestPayload,
    ) -> Result<Vec<ApprovalStep>, ValidationError> {
        let amount = payload.amount.ok_or(ValidationError::MissingAmount)?;
        let sensitive = payload.category.as_deref().is_some_and(|category| {
            self.policy
                .sensitive_categories
                .iter()
                .any(|candidate| normalize_key(candidate) == normalize_key(category))
        });

        // Steps are additive and strictly ordered manager -> HR -> finance.
        let mut chain = vec![ApprovalStep::new(Level::Manager, vec![Role::TeamManager])];
        if amount > self.policy.hr_review_threshold || sensitive {
            chain.push(ApprovalStep::new(Level::Hr, vec![Role::Hr]));
        }
        if amount > self.policy.finance_review_threshold {
            chain.push(ApprovalStep::new(Level::Finance, vec![Role::Finance]));
        }
        Ok(chain)
    }
}

fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::actor::Role;
    use crate::domain::request::{Level, RequestKind};
    use crate::errors::ValidationError;
    use crate::payload::RequestPayload;

    use super::{ChainResolver, PolicyConfig};

    fn levels(resolver: &ChainResolver, kind: RequestKind, role: Role, payload: &RequestPayload) -> Vec<Level> {
        resolver
            .resolve(kind, role, payload)
            .expect("resolve")
            .into_iter()
            .map(|step| step.level)
            .collect()
    }

    #[test]
    fn permission_chain_for_an_employee_has_three_levels() {
        let resolver = ChainResolver::default();
        assert_eq!(
            levels(&resolver, RequestKind::Permission, Role::Employee, &RequestPayload::default()),
            vec![Level::TeamLeader, Level::TeamManager, Level::Hr]
        );
    }

    #[test]
    fn lead_level_requesters_skip_their_own_peer_step() {
        let resolver = ChainResolver::default();
        assert_eq!(
            levels(&resolver, RequestKind::Permission, Role::TeamLeader, &RequestPayload::default()),
            vec![Level::TeamManager, Level::Hr]
        );
    }

    #[test]
    fn regularization_defaults_to_manager_then_hr() {
        let resolver = ChainResolver::default();
        assert_eq!(
            levels(&resolver, RequestKind::Regularization, Role::Employee, &RequestPayload::default()),
            vec![Level::TeamManager, Level::Hr]
        );
    }

    #[test]
    fn configured_subtypes_shorten_regularization_to_hr_only() {
        let resolver = ChainResolver::default();
        let mut payload = RequestPayload::default();
        payload.subtype = Some("Timeclock_Correction".to_string());

        assert_eq!(
            levels(&resolver, RequestKind::Regularization, Role::Employee, &payload),
            vec![Level::Hr]
        );
    }

    #[test]
    fn small_reimbursement_needs_only_a_manager() {
        let resolver = ChainResolver::default();
        let payload = RequestPayload::with_amount(Decimal::new(1_200, 0));

        assert_eq!(
            levels(&resolver, RequestKind::Reimbursement, Role::Employee, &payload),
            vec![Level::Manager]
        );
    }

    #[test]
    fn sensitive_category_adds_hr_review_regardless_of_amount() {
        let resolver = ChainResolver::default();
        let mut payload = RequestPayload::with_amount(Decimal::new(300, 0));
        payload.category = Some("Medical".to_string());

        assert_eq!(
            levels(&resolver, RequestKind::Reimbursement, Role::Employee, &payload),
            vec![Level::Manager, Level::Hr]
        );
    }

    #[test]
    fn large_reimbursement_runs_the_full_chain() {
        let resolver = ChainResolver::default();
        let mut payload = RequestPayload::with_amount(Decimal::new(30_000, 0));
        payload.category = Some("Travel".to_string());

        assert_eq!(
            levels(&resolver, RequestKind::Reimbursement, Role::Employee, &payload),
            vec![Level::Manager, Level::Hr, Level::Finance]
        );
    }

    #[test]
    fn reimbursement_without_an_amount_is_a_validation_error() {
        let resolver = ChainResolver::default();
        let error = resolver
            .resolve(RequestKind::Reimbursement, Role::Employee, &RequestPayload::default())
            .expect_err("missing amount");

        assert_eq!(error, ValidationError::MissingAmount);
    }

    #[test]
    fn resolution_is_deterministic_for_identical_inputs() {
        let resolver = ChainResolver::new(PolicyConfig::default());
        let payload = RequestPayload::with_amount(Decimal::new(7_500, 0));

        let first = resolver
            .resolve(RequestKind::Reimbursement, Role::Employee, &payload)
            .expect("resolve");
        let second = resolver
            .resolve(RequestKind::Reimbursement, Role::Employee, &payload)
            .expect("resolve");

        assert_eq!(first, second);
    }
}
