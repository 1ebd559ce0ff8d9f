//! Pure computation for payout distribution.

pub mod distribution;

pub use distribution::{distribute, Distribution, DistributionPolicy};
