//! Commission ledger operations for the repository.

use crate::domain::{CommissionEntry, CommissionStatus, TimeMs, UserId};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::warn;

use super::{parse_decimal_column, Repository};

impl Repository {
    /// Insert a commission entry into the ledger idempotently.
    ///
    /// Returns false when an entry with the same id already exists.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_commission_entry(
        &self,
        entry: &CommissionEntry,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO commission_entries (id, earner_user_id, amount, status, settlement_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(entry.id.as_str())
        .bind(entry.earner.as_str())
        .bind(entry.amount.to_canonical_string())
        .bind(entry.status.as_str())
        .bind(entry.settlement_id.as_deref())
        .bind(entry.created_at.as_ms())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert multiple commission entries in a single transaction.
    ///
    /// Returns the number of newly inserted entries (excludes duplicates).
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn insert_commission_entries_batch(
        &self,
        entries: &[CommissionEntry],
    ) -> Result<usize, sqlx::Error> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut total_inserted = 0usize;
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            let result = sqlx::query(
                r#"
                INSERT INTO commission_entries (id, earner_user_id, amount, status, settlement_id, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(entry.id.as_str())
            .bind(entry.earner.as_str())
            .bind(entry.amount.to_canonical_string())
            .bind(entry.status.as_str())
            .bind(entry.settlement_id.as_deref())
            .bind(entry.created_at.as_ms())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                total_inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(total_inserted)
    }

    /// Earners that currently have pending ledger entries, ordered by their
    /// earliest pending entry (FIFO fairness across earners).
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_pending_earners(&self) -> Result<Vec<UserId>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT earner_user_id, MIN(created_at) AS first_pending
            FROM commission_entries
            WHERE status = 'pending'
            GROUP BY earner_user_id
            ORDER BY first_pending ASC, earner_user_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| UserId::new(row.get::<String, _>("earner_user_id")))
            .collect())
    }

    /// Pending ledger entries for one earner, in creation order.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_pending_entries(
        &self,
        earner: &UserId,
    ) -> Result<Vec<CommissionEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, earner_user_id, amount, status, settlement_id, created_at
            FROM commission_entries
            WHERE earner_user_id = ? AND status = 'pending'
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(earner.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_entry).collect())
    }

    /// Query ledger entries with optional earner and status filters.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_commissions(
        &self,
        earner: Option<&UserId>,
        status: Option<CommissionStatus>,
    ) -> Result<Vec<CommissionEntry>, sqlx::Error> {
        let mut sql = String::from(
            "SELECT id, earner_user_id, amount, status, settlement_id, created_at \
             FROM commission_entries WHERE 1 = 1",
        );
        if earner.is_some() {
            sql.push_str(" AND earner_user_id = ?");
        }
        if status.is_some() {
            sql.push_str(" AND status = ?");
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC");

        let mut query = sqlx::query(&sql);
        if let Some(earner) = earner {
            query = query.bind(earner.as_str());
        }
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_entry).collect())
    }

    /// Get a single ledger entry by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_commission_entry(
        &self,
        id: &str,
    ) -> Result<Option<CommissionEntry>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, earner_user_id, amount, status, settlement_id, created_at
            FROM commission_entries
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_entry))
    }
}

fn row_to_entry(row: &SqliteRow) -> CommissionEntry {
    let id: String = row.get("id");
    let amount_str: String = row.get("amount");
    let status_str: String = row.get("status");

    let status = CommissionStatus::parse(&status_str).unwrap_or_else(|| {
        // Conservative fallback: an unreadable status must not re-enter the ledger.
        warn!(id = %id, status = %status_str, "Unknown commission status in database");
        CommissionStatus::Failed
    });

    CommissionEntry {
        amount: parse_decimal_column(&amount_str, "amount", &id),
        earner: UserId::new(row.get::<String, _>("earner_user_id")),
        status,
        settlement_id: row.get("settlement_id"),
        created_at: TimeMs::new(row.get("created_at")),
        id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::domain::Decimal;
    use std::str::FromStr;
    use tempfile::TempDir;

    async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn entry(id: &str, earner: &str, amount: &str, created_at: i64) -> CommissionEntry {
        CommissionEntry::with_id(
            id,
            UserId::new(earner),
            Decimal::from_str(amount).unwrap(),
            TimeMs::new(created_at),
        )
    }

    #[tokio::test]
    async fn test_insert_and_get_entry() {
        let (repo, _temp) = setup_test_db().await;

        let inserted = repo
            .insert_commission_entry(&entry("c-1", "u-1", "12.5", 1000))
            .await
            .expect("insert failed");
        assert!(inserted);

        let stored = repo
            .get_commission_entry("c-1")
            .await
            .expect("query failed")
            .expect("entry missing");
        assert_eq!(stored.earner, UserId::new("u-1"));
        assert_eq!(stored.amount, Decimal::from_str("12.5").unwrap());
        assert_eq!(stored.status, CommissionStatus::Pending);
    }

    #[tokio::test]
    async fn test_insert_duplicate_entry_ignored() {
        let (repo, _temp) = setup_test_db().await;

        let e = entry("c-1", "u-1", "10", 1000);
        assert!(repo.insert_commission_entry(&e).await.unwrap());
        assert!(!repo.insert_commission_entry(&e).await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_earners_fifo_order() {
        let (repo, _temp) = setup_test_db().await;

        // u-2's earliest pending entry predates u-1's.
        repo.insert_commission_entries_batch(&[
            entry("c-1", "u-1", "10", 2000),
            entry("c-2", "u-2", "10", 1000),
            entry("c-3", "u-1", "10", 3000),
        ])
        .await
        .unwrap();

        let earners = repo.query_pending_earners().await.unwrap();
        assert_eq!(earners, vec![UserId::new("u-2"), UserId::new("u-1")]);
    }

    #[tokio::test]
    async fn test_pending_entries_creation_order() {
        let (repo, _temp) = setup_test_db().await;

        repo.insert_commission_entries_batch(&[
            entry("c-2", "u-1", "30", 2000),
            entry("c-1", "u-1", "50", 1000),
            entry("c-3", "u-1", "20", 3000),
        ])
        .await
        .unwrap();

        let entries = repo
            .query_pending_entries(&UserId::new("u-1"))
            .await
            .unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c-1", "c-2", "c-3"]);
    }

    #[tokio::test]
    async fn test_query_commissions_filters() {
        let (repo, _temp) = setup_test_db().await;

        repo.insert_commission_entries_batch(&[
            entry("c-1", "u-1", "10", 1000),
            entry("c-2", "u-2", "20", 2000),
        ])
        .await
        .unwrap();

        let all = repo.query_commissions(None, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let u1 = repo
            .query_commissions(Some(&UserId::new("u-1")), None)
            .await
            .unwrap();
        assert_eq!(u1.len(), 1);
        assert_eq!(u1[0].id, "c-1");

        let completed = repo
            .query_commissions(None, Some(CommissionStatus::Completed))
            .await
            .unwrap();
        assert!(completed.is_empty());
    }

    #[tokio::test]
    async fn test_batch_insert_empty() {
        let (repo, _temp) = setup_test_db().await;
        assert_eq!(repo.insert_commission_entries_batch(&[]).await.unwrap(), 0);
    }
}
