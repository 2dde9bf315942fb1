use chrono::{DateTime, Utc};
use sqlx::Row;

use greenlight_core::domain::actor::ActorId;
use greenlight_core::domain::request::{
    ApprovalRequest, RequestId, RequestKind, RequestStatus,
};

use super::{RepositoryError, RequestRepository, UpdateOutcome};
use crate::DbPool;

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, kind, requester, payload, chain, current_idx, status, history,
       paid, resubmission_of, version, created_at, submitted_at, finalized_at";

fn decode(value: Result<String, sqlx::Error>) -> Result<String, RepositoryError> {
    value.map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("bad timestamp `{raw}`: {e}")))
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalRequest, RepositoryError> {
    let id = decode(row.try_get("id"))?;
    let kind_str = decode(row.try_get("kind"))?;
    let requester = decode(row.try_get("requester"))?;
    let payload_json = decode(row.try_get("payload"))?;
    let chain_json = decode(row.try_get("chain"))?;
    let current_idx: Option<i64> =
        row.try_get("current_idx").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str = decode(row.try_get("status"))?;
    let history_json = decode(row.try_get("history"))?;
    let paid: i64 = row.try_get("paid").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let resubmission_of: Option<String> =
        row.try_get("resubmission_of").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let version: i64 =
        row.try_get("version").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str = decode(row.try_get("created_at"))?;
    let submitted_at_str: Option<String> =
        row.try_get("submitted_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let finalized_at_str: Option<String> =
        row.try_get("finalized_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let kind = RequestKind::parse(&kind_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown request kind `{kind_str}`")))?;
    let status = RequestStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown status `{status_str}`")))?;

    Ok(ApprovalRequest {
        id: RequestId(id),
        kind,
        requester: ActorId(requester),
        payload: serde_json::from_str(&payload_json)
            .map_err(|e| RepositoryError::Decode(format!("bad payload json: {e}")))?,
        chain: serde_json::from_str(&chain_json)
            .map_err(|e| RepositoryError::Decode(format!("bad chain json: {e}")))?,
        current_index: current_idx.map(|i| i as usize),
        status,
        history: serde_json::from_str(&history_json)
            .map_err(|e| RepositoryError::Decode(format!("bad history json: {e}")))?,
        paid: paid != 0,
        resubmission_of: resubmission_of.map(RequestId),
        version: version as u64,
        created_at: parse_timestamp(&created_at_str)?,
        submitted_at: submitted_at_str.as_deref().map(parse_timestamp).transpose()?,
        finalized_at: finalized_at_str.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Decode(e.to_string()))
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM approval_request WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_request(r)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, request: &ApprovalRequest) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO approval_request (id, kind, requester, payload, chain, current_idx,
                                           status, history, paid, resubmission_of, version,
                                           created_at, submitted_at, finalized_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(request.kind.as_str())
        .bind(&request.requester.0)
        .bind(encode_json(&request.payload)?)
        .bind(encode_json(&request.chain)?)
        .bind(request.current_index.map(|i| i as i64))
        .bind(request.status.as_str())
        .bind(encode_json(&request.history)?)
        .bind(i64::from(request.paid))
        .bind(request.resubmission_of.as_ref().map(|id| id.0.clone()))
        .bind(request.version as i64)
        .bind(request.created_at.to_rfc3339())
        .bind(request.submitted_at.map(|dt| dt.to_rfc3339()))
        .bind(request.finalized_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(
        &self,
        request: &ApprovalRequest,
        expected_version: u64,
    ) -> Result<UpdateOutcome, RepositoryError> {
        let result = sqlx::query(
            "UPDATE approval_request SET
                 payload = ?, chain = ?, current_idx = ?, status = ?, history = ?,
                 paid = ?, version = ?, submitted_at = ?, finalized_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(encode_json(&request.payload)?)
        .bind(encode_json(&request.chain)?)
        .bind(request.current_index.map(|i| i as i64))
        .bind(request.status.as_str())
        .bind(encode_json(&request.history)?)
        .bind(i64::from(request.paid))
        .bind(request.version as i64)
        .bind(request.submitted_at.map(|dt| dt.to_rfc3339()))
        .bind(request.finalized_at.map(|dt| dt.to_rfc3339()))
        .bind(&request.id.0)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(UpdateOutcome::VersionConflict);
        }
        Ok(UpdateOutcome::Applied)
    }

    async fn list_for_requester(
        &self,
        requester: &ActorId,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM approval_request
             WHERE requester = ? ORDER BY created_at DESC"
        ))
        .bind(&requester.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()
    }

    async fn list_pending(&self) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM approval_request
             WHERE status = 'pending' ORDER BY submitted_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()
    }
}
