use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::AppState;
use crate::domain::{CommissionEntry, CommissionStatus, Decimal, TimeMs, UserId};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionsQuery {
    pub user: Option<String>,
    pub status: Option<String>,
}

/// Ledger append request from the earnings collaborator.
///
/// Supplying `id` makes the append idempotent; redelivered events with the
/// same id are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendCommissionRequest {
    pub id: Option<String>,
    pub earner_user_id: String,
    pub amount: String,
    pub created_at_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionDto {
    pub id: String,
    pub earner_user_id: String,
    pub amount: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_id: Option<String>,
    pub created_at_ms: i64,
}

impl From<CommissionEntry> for CommissionDto {
    fn from(e: CommissionEntry) -> Self {
        CommissionDto {
            id: e.id,
            earner_user_id: e.earner.as_str().to_string(),
            amount: e.amount.to_canonical_string(),
            status: e.status.to_string(),
            settlement_id: e.settlement_id,
            created_at_ms: e.created_at.as_ms(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendCommissionResponse {
    /// False when an entry with the same id already existed.
    pub inserted: bool,
    pub entry: CommissionDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionsResponse {
    pub commissions: Vec<CommissionDto>,
}

pub async fn append_commission(
    State(state): State<AppState>,
    Json(request): Json<AppendCommissionRequest>,
) -> Result<Json<AppendCommissionResponse>, AppError> {
    if request.earner_user_id.trim().is_empty() {
        return Err(AppError::BadRequest("earnerUserId must not be empty".into()));
    }

    let amount = Decimal::from_str(&request.amount)
        .map_err(|e| AppError::BadRequest(format!("invalid amount: {}", e)))?;
    if amount.is_negative() {
        return Err(AppError::BadRequest("amount must be non-negative".into()));
    }

    let earner = UserId::new(request.earner_user_id);
    let created_at = request
        .created_at_ms
        .map(TimeMs::new)
        .unwrap_or_else(TimeMs::now);

    let entry = match request.id {
        Some(id) if !id.trim().is_empty() => {
            CommissionEntry::with_id(id, earner, amount, created_at)
        }
        _ => CommissionEntry::new(earner, amount, created_at),
    };

    let inserted = state.repo.insert_commission_entry(&entry).await?;

    // Report the stored row, which differs from the request on a replay.
    let stored = state
        .repo
        .get_commission_entry(&entry.id)
        .await?
        .ok_or_else(|| AppError::Internal("entry vanished after insert".into()))?;

    Ok(Json(AppendCommissionResponse {
        inserted,
        entry: stored.into(),
    }))
}

pub async fn list_commissions(
    Query(params): Query<CommissionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<CommissionsResponse>, AppError> {
    let status = match params.status.as_deref() {
        Some("") | Some("all") | None => None,
        Some(s) => Some(CommissionStatus::parse(s).ok_or_else(|| {
            AppError::BadRequest(format!("invalid status filter: {}", s))
        })?),
    };

    let user = match params.user.as_deref() {
        Some("") | None => None,
        Some(u) => Some(UserId::new(u)),
    };

    let commissions = state
        .repo
        .query_commissions(user.as_ref(), status)
        .await?;

    Ok(Json(CommissionsResponse {
        commissions: commissions.into_iter().map(CommissionDto::from).collect(),
    }))
}
