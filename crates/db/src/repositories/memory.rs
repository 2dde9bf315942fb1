use std::collections::HashMap;

use tokio::sync::RwLock;

use greenlight_core::domain::actor::ActorId;
use greenlight_core::domain::request::{ApprovalRequest, RequestId, RequestStatus};

use super::{RepositoryError, RequestRepository, UpdateOutcome};

/// Map-backed repository honoring the same version guard as the SQL one.
/// Used by engine tests and anywhere a durable store is not wanted.
#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<HashMap<String, ApprovalRequest>>,
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn insert(&self, request: &ApprovalRequest) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.insert(request.id.0.clone(), request.clone());
        Ok(())
    }

    async fn update(
        &self,
        request: &ApprovalRequest,
        expected_version: u64,
    ) -> Result<UpdateOutcome, RepositoryError> {
        let mut requests = self.requests.write().await;
        match requests.get(&request.id.0) {
            Some(stored) if stored.version == expected_version => {
                requests.insert(request.id.0.clone(), request.clone());
                Ok(UpdateOutcome::Applied)
            }
            _ => Ok(UpdateOutcome::VersionConflict),
        }
    }

    async fn list_for_requester(
        &self,
        requester: &ActorId,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut mine: Vec<ApprovalRequest> =
            requests.values().filter(|r| &r.requester == requester).cloned().collect();
        mine.sort_by_key(|r| r.created_at);
        Ok(mine)
    }

    async fn list_pending(&self) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut pending: Vec<ApprovalRequest> = requests
            .values()
            .filter(|r| r.status == RequestStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.submitted_at);
        Ok(pending)
    }
}
