//! Settlement write, lifecycle, and reporting operations for the repository.

use crate::domain::{
    PlatformEarning, ReferralEarning, Settlement, SettlementMetadata, SettlementStatus, TimeMs,
    UserId,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::warn;

use super::{
    parse_decimal_column, Repository, SettlementFilter, SettlementSummary, SettlementWriteError,
};

impl Repository {
    // =========================================================================
    // Settlement writer (exclusive owner of entry status transitions)
    // =========================================================================

    /// Persist a new settlement and consume its source commission entries,
    /// as a single atomic transaction.
    ///
    /// Every source entry is re-validated inside the transaction: the update
    /// only applies while the entry is still `pending`. If any entry was
    /// already consumed by a concurrent writer, the whole transaction rolls
    /// back and the entries remain pending for the next run.
    ///
    /// # Errors
    /// Returns `Conflict` when a source entry is no longer pending, or a
    /// database error if the transaction fails.
    pub async fn write_settlement(
        &self,
        settlement: &Settlement,
    ) -> Result<(), SettlementWriteError> {
        let source_ids_json =
            serde_json::to_string(&settlement.metadata.source_commission_ids)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO settlements (
                id, earner_user_id, amount, status, payout_type,
                source_commission_ids, platform_share, level1_share, level2_share,
                completed_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(settlement.id.as_str())
        .bind(settlement.earner.as_str())
        .bind(settlement.amount.to_canonical_string())
        .bind(settlement.status.as_str())
        .bind(settlement.payout_type.as_str())
        .bind(&source_ids_json)
        .bind(settlement.metadata.platform_share.to_canonical_string())
        .bind(settlement.metadata.level1_share.to_canonical_string())
        .bind(settlement.metadata.level2_share.to_canonical_string())
        .bind(settlement.completed_at.map(|t| t.as_ms()))
        .bind(settlement.created_at.as_ms())
        .bind(settlement.updated_at.as_ms())
        .execute(&mut *tx)
        .await?;

        for entry_id in &settlement.metadata.source_commission_ids {
            let result = sqlx::query(
                r#"
                UPDATE commission_entries
                SET status = 'completed', settlement_id = ?
                WHERE id = ? AND status = 'pending'
                "#,
            )
            .bind(settlement.id.as_str())
            .bind(entry_id.as_str())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() != 1 {
                // Dropping the transaction rolls everything back.
                return Err(SettlementWriteError::Conflict {
                    entry_id: entry_id.clone(),
                });
            }
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Lifecycle transitions (compare-and-swap on `pending`)
    // =========================================================================

    /// Transition a settlement to `completed` and record its earnings, as
    /// one atomic unit.
    ///
    /// Returns false when the settlement was not pending (the CAS did not
    /// match); nothing is written in that case.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn complete_settlement_atomic(
        &self,
        settlement_id: &str,
        now: TimeMs,
        platform_earning: &PlatformEarning,
        referral_earnings: &[ReferralEarning],
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE settlements
            SET status = 'completed', completed_at = ?, updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(now.as_ms())
        .bind(now.as_ms())
        .bind(settlement_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO platform_earnings (id, source_settlement_id, amount, currency, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(platform_earning.id.as_str())
        .bind(platform_earning.source_settlement_id.as_str())
        .bind(platform_earning.amount.to_canonical_string())
        .bind(platform_earning.currency.as_str())
        .bind(platform_earning.created_at.as_ms())
        .execute(&mut *tx)
        .await?;

        for earning in referral_earnings {
            sqlx::query(
                r#"
                INSERT INTO referral_earnings (id, referrer_user_id, source_settlement_id, amount, level, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(earning.id.as_str())
            .bind(earning.referrer.as_str())
            .bind(earning.source_settlement_id.as_str())
            .bind(earning.amount.to_canonical_string())
            .bind(earning.level as i64)
            .bind(earning.created_at.as_ms())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Transition a settlement to `failed`.
    ///
    /// Consumed commission entries are deliberately left `completed`: ledger
    /// consumption and payout execution are separate concerns.
    ///
    /// Returns false when the settlement was not pending.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn fail_settlement_atomic(
        &self,
        settlement_id: &str,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE settlements
            SET status = 'failed', updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(now.as_ms())
        .bind(settlement_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Reporting (read-only)
    // =========================================================================

    /// Get a settlement by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_settlement(&self, id: &str) -> Result<Option<Settlement>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, earner_user_id, amount, status, payout_type,
                   source_commission_ids, platform_share, level1_share, level2_share,
                   completed_at, created_at, updated_at
            FROM settlements
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_settlement))
    }

    /// List settlements matching a filter, most recent first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_settlements(
        &self,
        filter: &SettlementFilter,
    ) -> Result<Vec<Settlement>, sqlx::Error> {
        let mut sql = String::from(
            "SELECT id, earner_user_id, amount, status, payout_type, \
                    source_commission_ids, platform_share, level1_share, level2_share, \
                    completed_at, created_at, updated_at \
             FROM settlements WHERE 1 = 1",
        );
        push_filter_clauses(&mut sql, filter);
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let query = bind_filter(sqlx::query(&sql), filter);
        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows.iter().map(row_to_settlement).collect())
    }

    /// Fold settlements matching a filter into a summary.
    ///
    /// # Implementation Note
    ///
    /// We iterate in Rust to preserve decimal precision. SQLite's SUM
    /// aggregate returns REAL (float), which would lose precision for
    /// financial totals. By fetching rows and summing with our Decimal type,
    /// we maintain lossless arithmetic.
    pub async fn summarize(
        &self,
        filter: &SettlementFilter,
    ) -> Result<SettlementSummary, sqlx::Error> {
        let mut sql = String::from(
            "SELECT id, amount, status, platform_share, level1_share, level2_share \
             FROM settlements WHERE 1 = 1",
        );
        push_filter_clauses(&mut sql, filter);

        let query = bind_filter(sqlx::query(&sql), filter);
        let rows = query.fetch_all(&self.pool).await?;

        let mut summary = SettlementSummary::default();
        for row in &rows {
            let id: String = row.get("id");
            let amount: String = row.get("amount");
            let platform: String = row.get("platform_share");
            let level1: String = row.get("level1_share");
            let level2: String = row.get("level2_share");
            let status_str: String = row.get("status");

            summary.total_count += 1;
            summary.total_amount =
                summary.total_amount + parse_decimal_column(&amount, "amount", &id);
            summary.platform_total =
                summary.platform_total + parse_decimal_column(&platform, "platform_share", &id);
            summary.level1_total =
                summary.level1_total + parse_decimal_column(&level1, "level1_share", &id);
            summary.level2_total =
                summary.level2_total + parse_decimal_column(&level2, "level2_share", &id);

            match SettlementStatus::parse(&status_str) {
                Some(SettlementStatus::Pending) => summary.pending_count += 1,
                Some(SettlementStatus::Completed) => summary.completed_count += 1,
                Some(SettlementStatus::Failed) | None => summary.failed_count += 1,
            }
        }

        Ok(summary)
    }

    // =========================================================================
    // Earnings queries
    // =========================================================================

    /// List all platform earnings, most recent first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_platform_earnings(&self) -> Result<Vec<PlatformEarning>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, source_settlement_id, amount, currency, created_at
            FROM platform_earnings
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let id: String = row.get("id");
                let amount: String = row.get("amount");
                PlatformEarning {
                    amount: parse_decimal_column(&amount, "amount", &id),
                    source_settlement_id: row.get("source_settlement_id"),
                    currency: row.get("currency"),
                    created_at: TimeMs::new(row.get("created_at")),
                    id,
                }
            })
            .collect())
    }

    /// Platform earning created for a settlement, if any.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_platform_earning_by_settlement(
        &self,
        settlement_id: &str,
    ) -> Result<Option<PlatformEarning>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, source_settlement_id, amount, currency, created_at
            FROM platform_earnings
            WHERE source_settlement_id = ?
            "#,
        )
        .bind(settlement_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let id: String = r.get("id");
            let amount: String = r.get("amount");
            PlatformEarning {
                amount: parse_decimal_column(&amount, "amount", &id),
                source_settlement_id: r.get("source_settlement_id"),
                currency: r.get("currency"),
                created_at: TimeMs::new(r.get("created_at")),
                id,
            }
        }))
    }

    /// Referral earnings created for a settlement, ordered by level.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_referral_earnings(
        &self,
        settlement_id: &str,
    ) -> Result<Vec<ReferralEarning>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, referrer_user_id, source_settlement_id, amount, level, created_at
            FROM referral_earnings
            WHERE source_settlement_id = ?
            ORDER BY level ASC
            "#,
        )
        .bind(settlement_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let id: String = row.get("id");
                let amount: String = row.get("amount");
                ReferralEarning {
                    amount: parse_decimal_column(&amount, "amount", &id),
                    referrer: UserId::new(row.get::<String, _>("referrer_user_id")),
                    source_settlement_id: row.get("source_settlement_id"),
                    level: row.get::<i64, _>("level") as u8,
                    created_at: TimeMs::new(row.get("created_at")),
                    id,
                }
            })
            .collect())
    }
}

fn push_filter_clauses(sql: &mut String, filter: &SettlementFilter) {
    if filter.user.is_some() {
        sql.push_str(" AND earner_user_id = ?");
    }
    if filter.status.is_some() {
        sql.push_str(" AND status = ?");
    }
    if filter.from_ms.is_some() {
        sql.push_str(" AND created_at >= ?");
    }
    if filter.to_ms.is_some() {
        sql.push_str(" AND created_at <= ?");
    }
}

fn bind_filter<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    filter: &'q SettlementFilter,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    if let Some(user) = &filter.user {
        query = query.bind(user.as_str());
    }
    if let Some(status) = filter.status {
        query = query.bind(status.as_str());
    }
    if let Some(from) = filter.from_ms {
        query = query.bind(from.as_ms());
    }
    if let Some(to) = filter.to_ms {
        query = query.bind(to.as_ms());
    }
    query
}

fn row_to_settlement(row: &SqliteRow) -> Settlement {
    let id: String = row.get("id");
    let amount: String = row.get("amount");
    let platform: String = row.get("platform_share");
    let level1: String = row.get("level1_share");
    let level2: String = row.get("level2_share");
    let status_str: String = row.get("status");
    let source_ids_json: String = row.get("source_commission_ids");

    let status = SettlementStatus::parse(&status_str).unwrap_or_else(|| {
        // Conservative fallback: an unreadable status must not look payable.
        warn!(id = %id, status = %status_str, "Unknown settlement status in database");
        SettlementStatus::Failed
    });

    let source_commission_ids: Vec<String> = serde_json::from_str(&source_ids_json)
        .unwrap_or_else(|e| {
            warn!(id = %id, error = %e, "Failed to parse source commission ids, using empty list");
            Vec::new()
        });

    Settlement {
        earner: UserId::new(row.get::<String, _>("earner_user_id")),
        amount: parse_decimal_column(&amount, "amount", &id),
        status,
        payout_type: row.get("payout_type"),
        metadata: SettlementMetadata {
            source_commission_ids,
            platform_share: parse_decimal_column(&platform, "platform_share", &id),
            level1_share: parse_decimal_column(&level1, "level1_share", &id),
            level2_share: parse_decimal_column(&level2, "level2_share", &id),
        },
        completed_at: row.get::<Option<i64>, _>("completed_at").map(TimeMs::new),
        created_at: TimeMs::new(row.get("created_at")),
        updated_at: TimeMs::new(row.get("updated_at")),
        id,
    }
}
