//! Distribution calculator: splits an aggregated commission total between
//! the platform, up to two referrers, and the earner.
//!
//! Pure and synchronous; all arithmetic is Decimal. Referral shares apply
//! only when the corresponding chain level exists. Each carved share is
//! floored to cents and the residue stays with the earner, so the four
//! shares always sum exactly to the input total.

use crate::domain::{Decimal, ReferralChain};

/// Payout rates, as fractions of the aggregated total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributionPolicy {
    pub platform_rate: Decimal,
    pub level1_rate: Decimal,
    pub level2_rate: Decimal,
}

impl Default for DistributionPolicy {
    /// Standard split: 10% platform, 20% direct referrer, 10% second-level.
    fn default() -> Self {
        Self {
            platform_rate: Decimal::from_basis_points(1000),
            level1_rate: Decimal::from_basis_points(2000),
            level2_rate: Decimal::from_basis_points(1000),
        }
    }
}

/// The computed split of one settlement group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Distribution {
    pub platform_share: Decimal,
    pub level1_share: Decimal,
    pub level2_share: Decimal,
    pub earner_share: Decimal,
}

impl Distribution {
    /// Sum of all four shares; equals the distributed total.
    pub fn total(&self) -> Decimal {
        self.platform_share + self.level1_share + self.level2_share + self.earner_share
    }
}

/// Split `total` according to `policy` and the resolved referral chain.
///
/// Callers must validate that `total` is non-negative before calling; the
/// batch treats a negative group total as a configuration error and skips
/// the group.
pub fn distribute(
    total: Decimal,
    chain: &ReferralChain,
    policy: &DistributionPolicy,
) -> Distribution {
    let platform_share = (total * policy.platform_rate).floor_to_cents();

    let level1_share = match chain.level1() {
        Some(_) => (total * policy.level1_rate).floor_to_cents(),
        None => Decimal::zero(),
    };

    let level2_share = match chain.level2() {
        Some(_) => (total * policy.level2_rate).floor_to_cents(),
        None => Decimal::zero(),
    };

    // Earner takes the remainder, including any sub-cent residue from
    // flooring, so the shares reconcile exactly against the total.
    let earner_share = total - platform_share - level1_share - level2_share;

    Distribution {
        platform_share,
        level1_share,
        level2_share,
        earner_share,
    }
}
