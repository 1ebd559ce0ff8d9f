//! Referral ancestry of an earner.

use crate::domain::UserId;

/// The up-to-two-level chain of referrers above an earner.
///
/// A dangling edge (referrer id that no longer resolves) collapses to the
/// shorter variant; "no referrer" and "missing referrer" are deliberately
/// the same shape for the distribution calculator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferralChain {
    NoReferrer,
    OneLevel(UserId),
    TwoLevels(UserId, UserId),
}

impl ReferralChain {
    /// Build a chain from optional lookups, normalizing the illegal
    /// "level2 without level1" shape away.
    pub fn from_levels(level1: Option<UserId>, level2: Option<UserId>) -> Self {
        match (level1, level2) {
            (Some(l1), Some(l2)) => ReferralChain::TwoLevels(l1, l2),
            (Some(l1), None) => ReferralChain::OneLevel(l1),
            (None, _) => ReferralChain::NoReferrer,
        }
    }

    /// Direct referrer, if any.
    pub fn level1(&self) -> Option<&UserId> {
        match self {
            ReferralChain::NoReferrer => None,
            ReferralChain::OneLevel(l1) => Some(l1),
            ReferralChain::TwoLevels(l1, _) => Some(l1),
        }
    }

    /// Referrer's referrer, if any.
    pub fn level2(&self) -> Option<&UserId> {
        match self {
            ReferralChain::TwoLevels(_, l2) => Some(l2),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_levels_two() {
        let chain = ReferralChain::from_levels(Some(UserId::new("r1")), Some(UserId::new("r2")));
        assert_eq!(chain.level1(), Some(&UserId::new("r1")));
        assert_eq!(chain.level2(), Some(&UserId::new("r2")));
    }

    #[test]
    fn test_from_levels_one() {
        let chain = ReferralChain::from_levels(Some(UserId::new("r1")), None);
        assert_eq!(chain, ReferralChain::OneLevel(UserId::new("r1")));
        assert!(chain.level2().is_none());
    }

    #[test]
    fn test_from_levels_none() {
        let chain = ReferralChain::from_levels(None, None);
        assert_eq!(chain, ReferralChain::NoReferrer);
    }

    #[test]
    fn test_level2_without_level1_normalizes() {
        let chain = ReferralChain::from_levels(None, Some(UserId::new("r2")));
        assert_eq!(chain, ReferralChain::NoReferrer);
    }
}
