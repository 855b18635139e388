//! In-memory Referral Ledger.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use crate::domain::foundation::{CustomerId, DomainError, ErrorCode, ReferralId, Timestamp};
use crate::domain::referral::Referral;
use crate::ports::ReferralRepository;

#[derive(Default)]
pub struct InMemoryReferralRepository {
    referrals: RwLock<BTreeMap<ReferralId, Referral>>,
    next_id: AtomicI64,
}

impl InMemoryReferralRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReferralRepository for InMemoryReferralRepository {
    async fn create(
        &self,
        referrer: CustomerId,
        referee: CustomerId,
    ) -> Result<Referral, DomainError> {
        Referral::validate_link(referrer, referee)?;
        let mut referrals = self.referrals.write().await;
        if referrals.values().any(|r| r.referee_id == referee) {
            return Err(DomainError::new(
                ErrorCode::ReferralExists,
                format!("Customer {} was already referred", referee),
            ));
        }
        let id = ReferralId::from_raw(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let referral = Referral {
            id,
            referrer_id: referrer,
            referee_id: referee,
            used_at: Timestamp::now(),
            bonus_granted: false,
        };
        referrals.insert(id, referral.clone());
        Ok(referral)
    }

    async fn find_by_referee(&self, referee: CustomerId) -> Result<Option<Referral>, DomainError> {
        Ok(self
            .referrals
            .read()
            .await
            .values()
            .find(|r| r.referee_id == referee)
            .cloned())
    }

    async fn find_by_referrer(&self, referrer: CustomerId) -> Result<Vec<Referral>, DomainError> {
        Ok(self
            .referrals
            .read()
            .await
            .values()
            .filter(|r| r.referrer_id == referrer)
            .cloned()
            .collect())
    }

    async fn count_by_referrer(&self, referrer: CustomerId) -> Result<u64, DomainError> {
        Ok(self.find_by_referrer(referrer).await?.len() as u64)
    }

    async fn mark_bonus_granted(&self, id: ReferralId) -> Result<bool, DomainError> {
        let mut referrals = self.referrals.write().await;
        match referrals.get_mut(&id) {
            Some(referral) if !referral.bonus_granted => {
                referral.bonus_granted = true;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(DomainError::new(
                ErrorCode::ReferralNotFound,
                format!("Referral {} not found", id),
            )),
        }
    }

    async fn release_bonus(&self, id: ReferralId) -> Result<bool, DomainError> {
        let mut referrals = self.referrals.write().await;
        match referrals.get_mut(&id) {
            Some(referral) if referral.bonus_granted => {
                referral.bonus_granted = false;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(DomainError::new(
                ErrorCode::ReferralNotFound,
                format!("Referral {} not found", id),
            )),
        }
    }
}
