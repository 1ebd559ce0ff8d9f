//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `commissions.rs` - Commission ledger operations
//! - `settlements.rs` - Settlement write/lifecycle/reporting operations

mod commissions;
mod settlements;

use crate::domain::{Decimal, SettlementStatus, TimeMs, UserId};
use sqlx::sqlite::SqlitePool;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Filter over persisted settlements, used by listing, summary, and export.
#[derive(Debug, Clone, Default)]
pub struct SettlementFilter {
    pub from_ms: Option<TimeMs>,
    pub to_ms: Option<TimeMs>,
    pub user: Option<UserId>,
    pub status: Option<SettlementStatus>,
}

/// Read-only rollup over settlements matching a filter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettlementSummary {
    pub total_amount: Decimal,
    pub total_count: usize,
    pub pending_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub platform_total: Decimal,
    pub level1_total: Decimal,
    pub level2_total: Decimal,
}

/// Failure writing a settlement and consuming its source entries.
#[derive(Debug, Error)]
pub enum SettlementWriteError {
    /// A source entry was no longer pending at transaction time; the whole
    /// write rolled back and the entries stay available for the next run.
    #[error("commission entry {entry_id} was not pending at commit time")]
    Conflict { entry_id: String },
    #[error("failed to encode settlement metadata: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    // =========================================================================
    // Referral edge projection (read-mostly; upsert exists for seeding)
    // =========================================================================

    /// Upsert a user -> referrer edge in the read projection.
    ///
    /// The projection is owned by the surrounding platform; this method
    /// exists for operational backfills and tests.
    pub async fn upsert_referral_edge(
        &self,
        user: &UserId,
        referrer: Option<&UserId>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO referral_edges (user_id, referrer_user_id)
            VALUES (?, ?)
            ON CONFLICT(user_id) DO UPDATE SET referrer_user_id = excluded.referrer_user_id
            "#,
        )
        .bind(user.as_str())
        .bind(referrer.map(|r| r.as_str()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Parse a stored canonical decimal, warning and defaulting on corruption.
pub(crate) fn parse_decimal_column(value: &str, column: &str, row_id: &str) -> Decimal {
    Decimal::from_str(value).unwrap_or_else(|e| {
        warn!(
            row_id = %row_id,
            column = %column,
            value = %value,
            error = %e,
            "Failed to parse stored decimal, using default"
        );
        Decimal::default()
    })
}
