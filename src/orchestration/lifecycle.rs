//! Settlement lifecycle manager.
//!
//! State machine per settlement:
//!
//! ```text
//! pending --(payment confirmed)--> completed   [records earnings]
//! pending --(payment error)------> failed
//! completed, failed: terminal
//! ```
//!
//! Both transitions are idempotent: payment systems redeliver confirmations,
//! so a call against an already-terminal settlement reports the current
//! state instead of re-applying side effects.

use crate::db::Repository;
use crate::domain::{
    PlatformEarning, ReferralChain, ReferralEarning, Settlement, TimeMs,
};
use crate::referral::{ReferralError, ReferralResolver};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub struct LifecycleManager {
    repo: Arc<Repository>,
    resolver: ReferralResolver,
    currency: String,
}

/// Result of a lifecycle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// The transition was applied by this call.
    Applied(Settlement),
    /// The settlement was already terminal; nothing changed.
    AlreadyTerminal(Settlement),
}

impl LifecycleOutcome {
    pub fn settlement(&self) -> &Settlement {
        match self {
            LifecycleOutcome::Applied(s) => s,
            LifecycleOutcome::AlreadyTerminal(s) => s,
        }
    }

    pub fn applied(&self) -> bool {
        matches!(self, LifecycleOutcome::Applied(_))
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("settlement not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Referral(#[from] ReferralError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl LifecycleManager {
    pub fn new(repo: Arc<Repository>, resolver: ReferralResolver, currency: String) -> Self {
        Self {
            repo,
            resolver,
            currency,
        }
    }

    /// Confirm payment for a pending settlement.
    ///
    /// Atomically flips the settlement to `completed` and records the
    /// platform earning plus referrer earnings for every positive stored
    /// share whose referrer still resolves.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown settlement id, or a persistence
    /// error if the transaction fails.
    pub async fn complete(&self, id: &str) -> Result<LifecycleOutcome, LifecycleError> {
        let settlement = self.load(id).await?;
        if settlement.status.is_terminal() {
            info!(
                settlement_id = %id,
                status = %settlement.status,
                "Settlement already terminal, completion ignored"
            );
            return Ok(LifecycleOutcome::AlreadyTerminal(settlement));
        }

        let now = TimeMs::now();
        let platform_earning = PlatformEarning::new(
            id,
            settlement.metadata.platform_share,
            self.currency.clone(),
            now,
        );
        let referral_earnings = self.build_referral_earnings(&settlement, now).await?;

        let applied = self
            .repo
            .complete_settlement_atomic(id, now, &platform_earning, &referral_earnings)
            .await?;

        let current = self.load(id).await?;
        if !applied {
            // Lost the race to a concurrent transition.
            info!(
                settlement_id = %id,
                status = %current.status,
                "Settlement transitioned concurrently, completion ignored"
            );
            return Ok(LifecycleOutcome::AlreadyTerminal(current));
        }

        info!(
            settlement_id = %id,
            earner = %current.earner,
            amount = %current.amount,
            "Settlement completed"
        );
        Ok(LifecycleOutcome::Applied(current))
    }

    /// Record a payment error for a pending settlement.
    ///
    /// The commission entries consumed by the settlement writer stay
    /// `completed`: ledger consumption and payout execution are separate
    /// concerns, and no earnings are recorded for a failed payout.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown settlement id, or a persistence
    /// error if the update fails.
    pub async fn fail(&self, id: &str) -> Result<LifecycleOutcome, LifecycleError> {
        let settlement = self.load(id).await?;
        if settlement.status.is_terminal() {
            info!(
                settlement_id = %id,
                status = %settlement.status,
                "Settlement already terminal, failure ignored"
            );
            return Ok(LifecycleOutcome::AlreadyTerminal(settlement));
        }

        let applied = self
            .repo
            .fail_settlement_atomic(id, TimeMs::now())
            .await?;

        let current = self.load(id).await?;
        if !applied {
            return Ok(LifecycleOutcome::AlreadyTerminal(current));
        }

        info!(settlement_id = %id, earner = %current.earner, "Settlement failed");
        Ok(LifecycleOutcome::Applied(current))
    }

    async fn load(&self, id: &str) -> Result<Settlement, LifecycleError> {
        self.repo
            .get_settlement(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))
    }

    /// Build referrer earning rows for the positive stored shares.
    ///
    /// The chain is re-resolved at payment time; a referrer that no longer
    /// resolves forfeits its row rather than blocking the completion.
    async fn build_referral_earnings(
        &self,
        settlement: &Settlement,
        now: TimeMs,
    ) -> Result<Vec<ReferralEarning>, ReferralError> {
        let needs_chain = settlement.metadata.level1_share.is_positive()
            || settlement.metadata.level2_share.is_positive();
        let chain = if needs_chain {
            self.resolver.resolve_chain(&settlement.earner).await?
        } else {
            ReferralChain::NoReferrer
        };

        let mut earnings = Vec::new();

        if settlement.metadata.level1_share.is_positive() {
            match chain.level1() {
                Some(referrer) => earnings.push(ReferralEarning::new(
                    referrer.clone(),
                    settlement.id.clone(),
                    settlement.metadata.level1_share,
                    1,
                    now,
                )),
                None => warn!(
                    settlement_id = %settlement.id,
                    "Level-1 referrer no longer resolvable, skipping earning"
                ),
            }
        }

        if settlement.metadata.level2_share.is_positive() {
            match chain.level2() {
                Some(referrer) => earnings.push(ReferralEarning::new(
                    referrer.clone(),
                    settlement.id.clone(),
                    settlement.metadata.level2_share,
                    2,
                    now,
                )),
                None => warn!(
                    settlement_id = %settlement.id,
                    "Level-2 referrer no longer resolvable, skipping earning"
                ),
            }
        }

        Ok(earnings)
    }
}
