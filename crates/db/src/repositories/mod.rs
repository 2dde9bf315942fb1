use async_trait::async_trait;
use thiserror::Error;

use greenlight_core::domain::actor::ActorId;
use greenlight_core::domain::request::{ApprovalRequest, RequestId};

pub mod memory;
pub mod request;

pub use memory::InMemoryRequestRepository;
pub use request::SqlRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Result of a version-guarded write. A conflict means another transition
/// committed since the record was read; the caller re-reads and retries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    VersionConflict,
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(&self, id: &RequestId)
        -> Result<Option<ApprovalRequest>, RepositoryError>;

    async fn insert(&self, request: &ApprovalRequest) -> Result<(), RepositoryError>;

    /// Write back a mutated record, conditional on the version the caller
    /// originally read. No partial writes: either the whole row is
    /// replaced or nothing happens.
    async fn update(
        &self,
        request: &ApprovalRequest,
        expected_version: u64,
    ) -> Result<UpdateOutcome, RepositoryError>;

    async fn list_for_requester(
        &self,
        requester: &ActorId,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError>;

    async fn list_pending(&self) -> Result<Vec<ApprovalRequest>, RepositoryError>;
}
