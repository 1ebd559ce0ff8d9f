//! The settlement batch: aggregate pending commissions per earner, resolve
//! the referral chain, compute the distribution, and write the settlement.
//!
//! Each earner settles in its own transaction; stopping the batch between
//! earners leaves no partial state, and re-running is idempotent because
//! consumed entries are no longer pending.

use crate::db::{Repository, SettlementWriteError};
use crate::domain::{CommissionEntry, Decimal, Settlement, SettlementMetadata, TimeMs, UserId};
use crate::engine::{distribute, DistributionPolicy};
use crate::referral::{ReferralError, ReferralResolver};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub struct SettlementBatch {
    repo: Arc<Repository>,
    resolver: ReferralResolver,
    policy: DistributionPolicy,
}

/// Outcome counts of one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Earners that had pending entries when the run started.
    pub earners: usize,
    /// Settlements written.
    pub settled: usize,
    /// Groups skipped for invalid amounts (configuration errors).
    pub skipped: usize,
    /// Groups lost to a concurrent writer; retried on the next run.
    pub conflicts: usize,
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Referral(#[from] ReferralError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

enum GroupOutcome {
    Settled,
    Skipped,
    Conflict,
}

impl SettlementBatch {
    pub fn new(repo: Arc<Repository>, resolver: ReferralResolver, policy: DistributionPolicy) -> Self {
        Self {
            repo,
            resolver,
            policy,
        }
    }

    /// Run one settlement pass over the pending ledger.
    ///
    /// Transient persistence errors abort the run; the atomicity of each
    /// per-earner write means an aborted run leaves nothing to clean up and
    /// the next scheduled run picks up where this one stopped.
    pub async fn run(&self) -> Result<BatchReport, BatchError> {
        let earners = self.repo.query_pending_earners().await?;

        let mut report = BatchReport {
            earners: earners.len(),
            ..Default::default()
        };

        for earner in &earners {
            match self.settle_earner(earner).await? {
                GroupOutcome::Settled => report.settled += 1,
                GroupOutcome::Skipped => report.skipped += 1,
                GroupOutcome::Conflict => report.conflicts += 1,
            }
        }

        info!(
            earners = report.earners,
            settled = report.settled,
            skipped = report.skipped,
            conflicts = report.conflicts,
            "Settlement batch finished"
        );
        Ok(report)
    }

    async fn settle_earner(&self, earner: &UserId) -> Result<GroupOutcome, BatchError> {
        let entries = self.repo.query_pending_entries(earner).await?;
        if entries.is_empty() {
            // A concurrent run consumed the group between the two queries.
            return Ok(GroupOutcome::Conflict);
        }

        let total = match validate_group(earner, &entries) {
            Some(total) => total,
            None => return Ok(GroupOutcome::Skipped),
        };

        let chain = self.resolver.resolve_chain(earner).await?;
        let distribution = distribute(total, &chain, &self.policy);

        let metadata = SettlementMetadata {
            source_commission_ids: entries.iter().map(|e| e.id.clone()).collect(),
            platform_share: distribution.platform_share,
            level1_share: distribution.level1_share,
            level2_share: distribution.level2_share,
        };
        let settlement = Settlement::new(
            earner.clone(),
            distribution.earner_share,
            metadata,
            TimeMs::now(),
        );

        match self.repo.write_settlement(&settlement).await {
            Ok(()) => {
                info!(
                    earner = %earner,
                    settlement_id = %settlement.id,
                    total = %total,
                    entries = entries.len(),
                    "Settlement written"
                );
                Ok(GroupOutcome::Settled)
            }
            Err(SettlementWriteError::Conflict { entry_id }) => {
                warn!(
                    earner = %earner,
                    entry_id = %entry_id,
                    "Entry consumed by concurrent writer, group deferred to next run"
                );
                Ok(GroupOutcome::Conflict)
            }
            Err(SettlementWriteError::Metadata(e)) => {
                warn!(earner = %earner, error = %e, "Unencodable settlement metadata, skipping group");
                Ok(GroupOutcome::Skipped)
            }
            Err(SettlementWriteError::Db(e)) => Err(BatchError::Db(e)),
        }
    }
}

/// Check group amounts and return the aggregated total, or None when the
/// group carries an invalid (negative) amount and must be skipped.
fn validate_group(earner: &UserId, entries: &[CommissionEntry]) -> Option<Decimal> {
    if let Some(bad) = entries.iter().find(|e| e.amount.is_negative()) {
        warn!(
            earner = %earner,
            entry_id = %bad.id,
            amount = %bad.amount,
            "Negative commission amount, skipping group"
        );
        return None;
    }

    let mut total = Decimal::zero();
    for entry in entries {
        total = total + entry.amount;
    }
    Some(total)
}
