//! Mock referral source for testing without a database.

use super::{ReferralError, ReferralSource};
use crate::domain::UserId;
use async_trait::async_trait;
use std::collections::HashMap;

/// Mock referral source returning edges from an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MockReferralSource {
    edges: HashMap<String, String>,
}

impl MockReferralSource {
    /// Create a new mock source with no edges.
    pub fn new() -> Self {
        Self {
            edges: HashMap::new(),
        }
    }

    /// Add a user → referrer edge.
    pub fn with_edge(mut self, user: impl Into<String>, referrer: impl Into<String>) -> Self {
        self.edges.insert(user.into(), referrer.into());
        self
    }
}

#[async_trait]
impl ReferralSource for MockReferralSource {
    async fn referrer_of(&self, user: &UserId) -> Result<Option<UserId>, ReferralError> {
        Ok(self.edges.get(user.as_str()).cloned().map(UserId::new))
    }
}
