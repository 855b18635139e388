//! Referral repository port - the Referral Ledger.

use async_trait::async_trait;

use crate::domain::foundation::{CustomerId, DomainError, ReferralId};
use crate::domain::referral::Referral;

/// Repository port for referral persistence.
#[async_trait]
pub trait ReferralRepository: Send + Sync {
    /// Record that `referee` was referred by `referrer`.
    ///
    /// # Errors
    ///
    /// - `ReferralExists` if the referee already has a referral
    async fn create(
        &self,
        referrer: CustomerId,
        referee: CustomerId,
    ) -> Result<Referral, DomainError>;

    async fn find_by_referee(&self, referee: CustomerId) -> Result<Option<Referral>, DomainError>;

    async fn find_by_referrer(&self, referrer: CustomerId) -> Result<Vec<Referral>, DomainError>;

    async fn count_by_referrer(&self, referrer: CustomerId) -> Result<u64, DomainError>;

    /// Flip `bonus_granted` from false to true.
    ///
    /// Returns `true` only for the caller that performed the flip.
    async fn mark_bonus_granted(&self, id: ReferralId) -> Result<bool, DomainError>;

    /// Flip `bonus_granted` back from true to false after the bonus could not
    /// be delivered. Returns `true` if the flag was set.
    async fn release_bonus(&self, id: ReferralId) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referral_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn ReferralRepository) {}
    }
}
