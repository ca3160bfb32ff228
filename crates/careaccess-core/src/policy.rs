//! Grant policy: duration, renewal and token use.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Shortest configurable grant duration.
pub const MIN_GRANT_DURATION: Duration = Duration::from_secs(60);

/// Longest configurable grant duration.
pub const MAX_GRANT_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Grant duration when none is configured.
pub const DEFAULT_GRANT_DURATION: Duration = Duration::from_secs(10 * 60);

/// What happens to a doctor's earlier grants when the patient issues another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalPolicy {
    /// Earlier grants stay valid until they expire or are revoked.
    #[default]
    Append,
    /// Earlier active grants for the same doctor are revoked on issuance.
    Replace,
}

/// How many writes one token may authorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUse {
    /// Unlimited checks until expiry or revocation.
    #[default]
    MultiUse,
    /// The first committed record spends the grant.
    SingleUse,
}

impl TokenUse {
    /// The use limit stamped on new grants.
    pub fn max_uses(self) -> Option<u32> {
        match self {
            TokenUse::MultiUse => None,
            TokenUse::SingleUse => Some(1),
        }
    }
}

/// Policy applied by the access service to every grant it issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    pub grant_duration: Duration,
    pub renewal: RenewalPolicy,
    pub token_use: TokenUse,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            grant_duration: DEFAULT_GRANT_DURATION,
            renewal: RenewalPolicy::default(),
            token_use: TokenUse::default(),
        }
    }
}

impl AccessPolicy {
    /// Build a policy, checking the duration bounds.
    pub fn new(grant_duration: Duration, renewal: RenewalPolicy, token_use: TokenUse) -> Result<Self> {
        let policy = Self {
            grant_duration,
            renewal,
            token_use,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Check that the grant duration lies within
    /// [`MIN_GRANT_DURATION`]..=[`MAX_GRANT_DURATION`].
    pub fn validate(&self) -> Result<()> {
        if self.grant_duration < MIN_GRANT_DURATION || self.grant_duration > MAX_GRANT_DURATION {
            return Err(CoreError::InvalidArgument(format!(
                "grant duration must be between {}s and {}s, got {}s",
                MIN_GRANT_DURATION.as_secs(),
                MAX_GRANT_DURATION.as_secs(),
                self.grant_duration.as_secs()
            )));
        }
        Ok(())
    }
}
