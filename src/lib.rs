pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod referral;

pub use config::Config;
pub use db::{init_db, Repository, SettlementFilter, SettlementSummary};
pub use domain::{
    CommissionEntry, CommissionStatus, Decimal, PlatformEarning, ReferralChain, ReferralEarning,
    Settlement, SettlementMetadata, SettlementStatus, TimeMs, UserId,
};
pub use engine::{distribute, Distribution, DistributionPolicy};
pub use error::AppError;
pub use orchestration::{LifecycleManager, SettlementBatch};
pub use referral::{DbReferralSource, MockReferralSource, ReferralResolver, ReferralSource};
