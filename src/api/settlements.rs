use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::db::{SettlementFilter, SettlementSummary};
use crate::domain::{Settlement, SettlementStatus, TimeMs, UserId};
use crate::error::AppError;
use crate::orchestration::{BatchReport, LifecycleOutcome};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementsQuery {
    pub user: Option<String>,
    pub status: Option<String>,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementDto {
    pub id: String,
    pub earner_user_id: String,
    pub amount: String,
    pub status: String,
    pub payout_type: String,
    pub source_commission_ids: Vec<String>,
    pub platform_share: String,
    pub level1_share: String,
    pub level2_share: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl From<Settlement> for SettlementDto {
    fn from(s: Settlement) -> Self {
        SettlementDto {
            id: s.id,
            earner_user_id: s.earner.as_str().to_string(),
            amount: s.amount.to_canonical_string(),
            status: s.status.to_string(),
            payout_type: s.payout_type,
            source_commission_ids: s.metadata.source_commission_ids,
            platform_share: s.metadata.platform_share.to_canonical_string(),
            level1_share: s.metadata.level1_share.to_canonical_string(),
            level2_share: s.metadata.level2_share.to_canonical_string(),
            completed_at_ms: s.completed_at.map(|t| t.as_ms()),
            created_at_ms: s.created_at.as_ms(),
            updated_at_ms: s.updated_at.as_ms(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementsResponse {
    pub settlements: Vec<SettlementDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDto {
    pub total_amount: String,
    pub total_count: usize,
    pub pending_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub platform_total: String,
    pub level1_total: String,
    pub level2_total: String,
}

impl From<SettlementSummary> for SummaryDto {
    fn from(s: SettlementSummary) -> Self {
        SummaryDto {
            total_amount: s.total_amount.to_canonical_string(),
            total_count: s.total_count,
            pending_count: s.pending_count,
            completed_count: s.completed_count,
            failed_count: s.failed_count,
            platform_total: s.platform_total.to_canonical_string(),
            level1_total: s.level1_total.to_canonical_string(),
            level2_total: s.level2_total.to_canonical_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReportDto {
    pub earners: usize,
    pub settled: usize,
    pub skipped: usize,
    pub conflicts: usize,
}

impl From<BatchReport> for BatchReportDto {
    fn from(r: BatchReport) -> Self {
        BatchReportDto {
            earners: r.earners,
            settled: r.settled,
            skipped: r.skipped,
            conflicts: r.conflicts,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    /// False when the settlement was already terminal and nothing changed.
    pub applied: bool,
    pub settlement: SettlementDto,
}

impl From<LifecycleOutcome> for TransitionResponse {
    fn from(outcome: LifecycleOutcome) -> Self {
        let applied = outcome.applied();
        let settlement = outcome.settlement().clone().into();
        TransitionResponse {
            applied,
            settlement,
        }
    }
}

pub async fn list_settlements(
    Query(params): Query<SettlementsQuery>,
    State(state): State<AppState>,
) -> Result<Json<SettlementsResponse>, AppError> {
    let filter = parse_filter(&params)?;
    let settlements = state.repo.list_settlements(&filter).await?;

    Ok(Json(SettlementsResponse {
        settlements: settlements.into_iter().map(SettlementDto::from).collect(),
    }))
}

pub async fn get_settlement(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SettlementDto>, AppError> {
    let settlement = state
        .repo
        .get_settlement(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("settlement {}", id)))?;

    Ok(Json(settlement.into()))
}

pub async fn get_summary(
    Query(params): Query<SettlementsQuery>,
    State(state): State<AppState>,
) -> Result<Json<SummaryDto>, AppError> {
    let filter = parse_filter(&params)?;
    let summary = state.repo.summarize(&filter).await?;
    Ok(Json(summary.into()))
}

/// Audit export: delimited text, one row per settlement.
pub async fn export_settlements(
    Query(params): Query<SettlementsQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let filter = parse_filter(&params)?;
    let settlements = state.repo.list_settlements(&filter).await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "id",
            "earnerUserId",
            "amount",
            "sourceCommissionIds",
            "createdAt",
            "status",
        ])
        .map_err(|e| AppError::Internal(e.to_string()))?;

    for settlement in settlements {
        writer
            .write_record([
                settlement.id.as_str(),
                settlement.earner.as_str(),
                &settlement.amount.to_canonical_string(),
                &settlement.metadata.source_commission_ids.join(","),
                &format_timestamp(settlement.created_at),
                settlement.status.as_str(),
            ])
            .map_err(|e| AppError::Internal(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let body = String::from_utf8(bytes).map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body))
}

pub async fn run_batch(
    State(state): State<AppState>,
) -> Result<Json<BatchReportDto>, AppError> {
    let report = state.batch.run().await?;
    Ok(Json(report.into()))
}

pub async fn complete_settlement(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TransitionResponse>, AppError> {
    let outcome = state.lifecycle.complete(&id).await?;
    Ok(Json(outcome.into()))
}

pub async fn fail_settlement(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TransitionResponse>, AppError> {
    let outcome = state.lifecycle.fail(&id).await?;
    Ok(Json(outcome.into()))
}

fn parse_filter(params: &SettlementsQuery) -> Result<SettlementFilter, AppError> {
    let status = match params.status.as_deref() {
        Some("") | Some("all") | None => None,
        Some(s) => Some(SettlementStatus::parse(s).ok_or_else(|| {
            AppError::BadRequest(format!("invalid status filter: {}", s))
        })?),
    };

    let user = match params.user.as_deref() {
        Some("") | None => None,
        Some(u) => Some(UserId::new(u)),
    };

    Ok(SettlementFilter {
        from_ms: params.from_ms.map(TimeMs::new),
        to_ms: params.to_ms.map(TimeMs::new),
        user,
        status,
    })
}

fn format_timestamp(at: TimeMs) -> String {
    chrono::DateTime::from_timestamp_millis(at.as_ms())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| at.as_ms().to_string())
}
