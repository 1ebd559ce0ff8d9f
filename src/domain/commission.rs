//! Commission ledger entry.

use crate::domain::{Decimal, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// Status of a commission ledger entry.
///
/// Monotonic: once an entry leaves `Pending` it never returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    /// Earned, not yet consumed by a settlement.
    Pending,
    /// Consumed by a settlement.
    Completed,
    Failed,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Completed => "completed",
            CommissionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CommissionStatus::Pending),
            "completed" => Some(CommissionStatus::Completed),
            "failed" => Some(CommissionStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of earned value attributable to a user.
///
/// Appended by the earnings side in `Pending` state; flipped to `Completed`
/// only inside a successful settlement write; never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionEntry {
    /// Stable unique identifier for this entry.
    pub id: String,
    /// The user who earned the commission.
    pub earner: UserId,
    /// Earned amount, non-negative.
    pub amount: Decimal,
    pub status: CommissionStatus,
    /// Settlement that consumed this entry, once settled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_id: Option<String>,
    pub created_at: TimeMs,
}

impl CommissionEntry {
    /// Create a new pending entry with a generated id.
    pub fn new(earner: UserId, amount: Decimal, created_at: TimeMs) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            earner,
            amount,
            status: CommissionStatus::Pending,
            settlement_id: None,
            created_at,
        }
    }

    /// Create a new pending entry with a caller-supplied id.
    ///
    /// The earnings collaborator may carry its own ledger keys; reusing them
    /// makes the append idempotent.
    pub fn with_id(
        id: impl Into<String>,
        earner: UserId,
        amount: Decimal,
        created_at: TimeMs,
    ) -> Self {
        Self {
            id: id.into(),
            earner,
            amount,
            status: CommissionStatus::Pending,
            settlement_id: None,
            created_at,
        }
    }
}
