//! Referral module - referee → referrer links and their one-time bonus.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CustomerId, ReferralId, Timestamp, ValidationError};

/// One buyer referred by another.
///
/// A referee appears in at most one referral. `bonus_granted` flips to true
/// once, on the referee's first paid purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    pub id: ReferralId,
    pub referrer_id: CustomerId,
    pub referee_id: CustomerId,
    pub used_at: Timestamp,
    pub bonus_granted: bool,
}

impl Referral {
    /// Checks the link before it is stored.
    pub fn validate_link(referrer: CustomerId, referee: CustomerId) -> Result<(), ValidationError> {
        if referrer == referee {
            return Err(ValidationError::invalid_format(
                "referee_id",
                "a customer cannot refer themselves",
            ));
        }
        Ok(())
    }

    /// True while the referrer is still owed the bonus.
    pub fn bonus_pending(&self) -> bool {
        !self.bonus_granted
    }
}
