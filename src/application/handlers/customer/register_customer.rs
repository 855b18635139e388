//! RegisterCustomerHandler - find-or-create on first contact, with an
//! optional referral link.

use std::sync::Arc;

use crate::domain::customer::{Customer, NewCustomer};
use crate::domain::foundation::{DomainError, ErrorCode, TelegramId};
use crate::domain::referral::Referral;
use crate::ports::{CustomerRepository, ReferralRepository};

#[derive(Debug, Clone)]
pub struct RegisterCustomerCommand {
    pub telegram_id: TelegramId,
    pub language: String,
    /// Referrer's telegram id, as carried in the bot's start parameter.
    pub referral_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegisterCustomerResult {
    pub customer: Customer,
    pub created: bool,
    pub referral: Option<Referral>,
}

pub struct RegisterCustomerHandler {
    customers: Arc<dyn CustomerRepository>,
    referrals: Arc<dyn ReferralRepository>,
}

impl RegisterCustomerHandler {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        referrals: Arc<dyn ReferralRepository>,
    ) -> Self {
        Self {
            customers,
            referrals,
        }
    }

    pub async fn handle(
        &self,
        cmd: RegisterCustomerCommand,
    ) -> Result<RegisterCustomerResult, DomainError> {
        // 1. Existing customers are returned as-is; referrals only count on first contact
        if let Some(customer) = self.customers.find_by_telegram_id(cmd.telegram_id).await? {
            return Ok(RegisterCustomerResult {
                customer,
                created: false,
                referral: None,
            });
        }

        // 2. Create, tolerating a concurrent registration
        let new_customer = NewCustomer::new(cmd.telegram_id, cmd.language);
        new_customer.validate()?;
        let customer = match self.customers.create(new_customer).await {
            Ok(customer) => customer,
            Err(e) if e.code == ErrorCode::CustomerExists => {
                let existing = self
                    .customers
                    .find_by_telegram_id(cmd.telegram_id)
                    .await?
                    .ok_or(e)?;
                return Ok(RegisterCustomerResult {
                    customer: existing,
                    created: false,
                    referral: None,
                });
            }
            Err(e) => return Err(e),
        };
        tracing::info!(customer_id = %customer.id, telegram_id = %customer.telegram_id, "Customer registered");

        // 3. Link the referrer, if any
        let referral = match cmd.referral_code.as_deref() {
            Some(code) => self.link_referrer(&customer, code).await?,
            None => None,
        };

        Ok(RegisterCustomerResult {
            customer,
            created: true,
            referral,
        })
    }

    async fn link_referrer(
        &self,
        referee: &Customer,
        code: &str,
    ) -> Result<Option<Referral>, DomainError> {
        let Ok(referrer_telegram_id) = code.trim().parse::<TelegramId>() else {
            tracing::warn!(code, "Ignoring malformed referral code");
            return Ok(None);
        };
        if referrer_telegram_id == referee.telegram_id {
            return Ok(None);
        }
        let Some(referrer) = self.customers.find_by_telegram_id(referrer_telegram_id).await? else {
            tracing::warn!(referrer = %referrer_telegram_id, "Referral code names an unknown customer");
            return Ok(None);
        };

        match self.referrals.create(referrer.id, referee.id).await {
            Ok(referral) => {
                tracing::info!(referrer_id = %referrer.id, referee_id = %referee.id, "Referral recorded");
                Ok(Some(referral))
            }
            Err(e) if e.code == ErrorCode::ReferralExists => Ok(None),
            Err(e) => Err(e),
        }
    }
}
