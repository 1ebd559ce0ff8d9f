use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::domain::PlatformEarning;
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformEarningDto {
    pub id: String,
    pub source_settlement_id: String,
    pub amount: String,
    pub currency: String,
    pub created_at_ms: i64,
}

impl From<PlatformEarning> for PlatformEarningDto {
    fn from(e: PlatformEarning) -> Self {
        PlatformEarningDto {
            id: e.id,
            source_settlement_id: e.source_settlement_id,
            amount: e.amount.to_canonical_string(),
            currency: e.currency,
            created_at_ms: e.created_at.as_ms(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformEarningsResponse {
    pub earnings: Vec<PlatformEarningDto>,
}

pub async fn list_platform_earnings(
    State(state): State<AppState>,
) -> Result<Json<PlatformEarningsResponse>, AppError> {
    let earnings = state.repo.list_platform_earnings().await?;

    Ok(Json(PlatformEarningsResponse {
        earnings: earnings.into_iter().map(PlatformEarningDto::from).collect(),
    }))
}
