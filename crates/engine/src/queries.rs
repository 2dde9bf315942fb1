use std::sync::Arc;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use greenlight_core::domain::actor::{ActorId, Role};
use greenlight_core::domain::request::{ApprovalRequest, Level, RequestStatus};
use greenlight_core::domain::snapshot::RequestSnapshot;
use greenlight_core::errors::EngineError;
use greenlight_db::repositories::RequestRepository;

/// Coarse display bucket. Draft and cancelled requests fall outside every
/// bucket and only show up when no bucket filter is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBucket {
    Pending,
    Approved,
    Rejected,
}

impl StatusBucket {
    fn matches(&self, status: RequestStatus) -> bool {
        matches!(
            (self, status),
            (Self::Pending, RequestStatus::Pending)
                | (Self::Approved, RequestStatus::Approved)
                | (Self::Rejected, RequestStatus::Rejected)
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilters {
    pub level: Option<Level>,
    pub bucket: Option<StatusBucket>,
    pub year: Option<i32>,
}

impl QueryFilters {
    fn matches(&self, request: &ApprovalRequest) -> bool {
        if let Some(level) = self.level {
            if request.current_level() != Some(level) {
                return false;
            }
        }
        if let Some(bucket) = self.bucket {
            if !bucket.matches(request.status) {
                return false;
            }
        }
        if let Some(year) = self.year {
            if request.submitted_at.map(|dt| dt.year()) != Some(year) {
                return false;
            }
        }
        true
    }
}

/// Aggregate counts over whatever set is currently displayed, never over
/// the unfiltered store. Cancelled requests count toward `total` only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

pub fn summarize(snapshots: &[RequestSnapshot]) -> RequestSummary {
    let mut summary = RequestSummary { total: snapshots.len(), ..RequestSummary::default() };
    for snapshot in snapshots {
        match snapshot.status {
            RequestStatus::Pending => summary.pending += 1,
            RequestStatus::Approved => summary.approved += 1,
            RequestStatus::Rejected => summary.rejected += 1,
            RequestStatus::Draft | RequestStatus::Cancelled => {}
        }
    }
    summary
}

/// Read-only views over the record store.
pub struct RequestQueries {
    repo: Arc<dyn RequestRepository>,
}

impl RequestQueries {
    pub fn new(repo: Arc<dyn RequestRepository>) -> Self {
        Self { repo }
    }

    /// Requests currently waiting on a step the caller's role may act for.
    pub async fn pending_for(
        &self,
        role: Role,
        filters: &QueryFilters,
    ) -> Result<Vec<RequestSnapshot>, EngineError> {
        let pending = self
            .repo
            .list_pending()
            .await
            .map_err(|e| EngineError::Persistence(e.to_string()))?;

        Ok(pending
            .iter()
            .filter(|request| {
                request.active_step().is_some_and(|step| step.permits(role))
                    && filters.matches(request)
            })
            .map(RequestSnapshot::from)
            .collect())
    }

    /// Everything the caller has ever requested, any status.
    pub async fn mine(
        &self,
        requester: &ActorId,
        filters: &QueryFilters,
    ) -> Result<Vec<RequestSnapshot>, EngineError> {
        let requests = self
            .repo
            .list_for_requester(requester)
            .await
            .map_err(|e| EngineError::Persistence(e.to_string()))?;

        Ok(requests
            .iter()
            .filter(|request| filters.matches(request))
            .map(RequestSnapshot::from)
            .collect())
    }
}
