//! Domain types for the commission settlement engine.
//!
//! This module provides:
//! - Lossless monetary handling via the Decimal wrapper
//! - Domain primitives: TimeMs, UserId
//! - Commission ledger entry and settlement record types
//! - The explicit ReferralChain sum type

pub mod commission;
pub mod decimal;
pub mod primitives;
pub mod referral;
pub mod settlement;

pub use commission::{CommissionEntry, CommissionStatus};
pub use decimal::Decimal;
pub use primitives::{TimeMs, UserId};
pub use referral::ReferralChain;
pub use settlement::{
    PlatformEarning, ReferralEarning, Settlement, SettlementMetadata, SettlementStatus,
    PAYOUT_TYPE_COMMISSION,
};
