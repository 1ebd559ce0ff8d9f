//! Settlement payout record, platform and referrer earnings.

use crate::domain::{Decimal, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// Payout type recorded on every settlement produced by the batch.
pub const PAYOUT_TYPE_COMMISSION: &str = "commission-payout";

/// Status of a settlement.
///
/// `Completed` and `Failed` are terminal; transitions happen only through
/// the lifecycle manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Pending,
    Completed,
    Failed,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Pending => "pending",
            SettlementStatus::Completed => "completed",
            SettlementStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SettlementStatus::Pending),
            "completed" => Some(SettlementStatus::Completed),
            "failed" => Some(SettlementStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SettlementStatus::Pending)
    }
}

impl std::fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed metadata record attached to a settlement.
///
/// `source_commission_ids` lists every ledger entry consumed; the three
/// shares together with `Settlement::amount` must sum exactly to the
/// aggregated total of those entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettlementMetadata {
    pub source_commission_ids: Vec<String>,
    pub platform_share: Decimal,
    pub level1_share: Decimal,
    pub level2_share: Decimal,
}

/// The payout record produced from one earner's pending commissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: String,
    pub earner: UserId,
    /// The earner's net share of the aggregated total.
    pub amount: Decimal,
    pub status: SettlementStatus,
    pub payout_type: String,
    pub metadata: SettlementMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<TimeMs>,
    pub created_at: TimeMs,
    pub updated_at: TimeMs,
}

impl Settlement {
    /// Create a new pending settlement with a generated id.
    pub fn new(
        earner: UserId,
        amount: Decimal,
        metadata: SettlementMetadata,
        created_at: TimeMs,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            earner,
            amount,
            status: SettlementStatus::Pending,
            payout_type: PAYOUT_TYPE_COMMISSION.to_string(),
            metadata,
            completed_at: None,
            created_at,
            updated_at: created_at,
        }
    }

    /// Total ledger value this settlement was derived from.
    pub fn aggregated_total(&self) -> Decimal {
        self.amount
            + self.metadata.platform_share
            + self.metadata.level1_share
            + self.metadata.level2_share
    }
}

/// Record of the platform's retained share, created when a settlement
/// reaches `Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEarning {
    pub id: String,
    pub source_settlement_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub created_at: TimeMs,
}

impl PlatformEarning {
    pub fn new(
        source_settlement_id: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
        created_at: TimeMs,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_settlement_id: source_settlement_id.into(),
            amount,
            currency: currency.into(),
            created_at,
        }
    }
}

/// Record of a referrer's share, created alongside the platform earning
/// when a settlement completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralEarning {
    pub id: String,
    /// The referrer receiving this share.
    pub referrer: UserId,
    pub source_settlement_id: String,
    pub amount: Decimal,
    /// Referral depth: 1 = direct referrer, 2 = referrer's referrer.
    pub level: u8,
    pub created_at: TimeMs,
}

impl ReferralEarning {
    pub fn new(
        referrer: UserId,
        source_settlement_id: impl Into<String>,
        amount: Decimal,
        level: u8,
        created_at: TimeMs,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            referrer,
            source_settlement_id: source_settlement_id.into(),
            amount,
            level,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn metadata(platform: &str, l1: &str, l2: &str) -> SettlementMetadata {
        SettlementMetadata {
            source_commission_ids: vec!["c-1".to_string(), "c-2".to_string()],
            platform_share: Decimal::from_str(platform).unwrap(),
            level1_share: Decimal::from_str(l1).unwrap(),
            level2_share: Decimal::from_str(l2).unwrap(),
        }
    }

    #[test]
    fn test_new_settlement_is_pending() {
        let s = Settlement::new(
            UserId::new("u-1"),
            Decimal::from_str("60").unwrap(),
            metadata("10", "20", "10"),
            TimeMs::new(1000),
        );
        assert_eq!(s.status, SettlementStatus::Pending);
        assert_eq!(s.payout_type, PAYOUT_TYPE_COMMISSION);
        assert!(s.completed_at.is_none());
        assert_eq!(s.created_at, s.updated_at);
    }

    #[test]
    fn test_aggregated_total() {
        let s = Settlement::new(
            UserId::new("u-1"),
            Decimal::from_str("60").unwrap(),
            metadata("10", "20", "10"),
            TimeMs::new(1000),
        );
        assert_eq!(s.aggregated_total(), Decimal::from_str("100").unwrap());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!SettlementStatus::Pending.is_terminal());
        assert!(SettlementStatus::Completed.is_terminal());
        assert!(SettlementStatus::Failed.is_terminal());
    }

    #[test]
    fn test_metadata_rejects_unknown_fields() {
        let json = r#"{
            "sourceCommissionIds": ["c-1"],
            "platformShare": 10,
            "level1Share": 0,
            "level2Share": 0,
            "extra": true
        }"#;
        let parsed: Result<SettlementMetadata, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }
}
