//! Referral graph read abstraction and the two-level chain resolver.
//!
//! The user/referral graph is owned by the surrounding platform; this
//! subsystem only reads the earner → referrer projection.

use crate::domain::{ReferralChain, UserId};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod mock;

pub use mock::MockReferralSource;

/// Read-only view of the referral graph.
#[async_trait]
pub trait ReferralSource: Send + Sync + fmt::Debug {
    /// Look up the direct referrer of a user.
    ///
    /// Returns `None` both when the user has no referrer and when the user
    /// itself is unknown: a dangling edge degrades rather than failing.
    async fn referrer_of(&self, user: &UserId) -> Result<Option<UserId>, ReferralError>;
}

#[derive(Debug, Error)]
pub enum ReferralError {
    #[error("referral lookup failed: {0}")]
    Lookup(#[from] sqlx::Error),
}

/// Referral source backed by the `referral_edges` projection table.
#[derive(Debug, Clone)]
pub struct DbReferralSource {
    pool: SqlitePool,
}

impl DbReferralSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferralSource for DbReferralSource {
    async fn referrer_of(&self, user: &UserId) -> Result<Option<UserId>, ReferralError> {
        let row = sqlx::query("SELECT referrer_user_id FROM referral_edges WHERE user_id = ?")
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row
            .and_then(|r| r.get::<Option<String>, _>("referrer_user_id"))
            .map(UserId::new))
    }
}

/// Resolves the up-to-two-level referral chain above an earner.
#[derive(Debug, Clone)]
pub struct ReferralResolver {
    source: Arc<dyn ReferralSource>,
}

impl ReferralResolver {
    pub fn new(source: Arc<dyn ReferralSource>) -> Self {
        Self { source }
    }

    /// Resolve the earner's referral chain: direct referrer first, then the
    /// referrer's referrer. Missing users at either level collapse to the
    /// shorter chain.
    pub async fn resolve_chain(&self, user: &UserId) -> Result<ReferralChain, ReferralError> {
        let level1 = self.source.referrer_of(user).await?;

        let level2 = match &level1 {
            Some(referrer) => self.source.referrer_of(referrer).await?,
            None => None,
        };

        Ok(ReferralChain::from_levels(level1, level2))
    }
}
