//! GetCustomerHandler - cached customer reads for the chat front end.
//!
//! The cache may serve a stale expiry; purchase decisions always read the
//! Customer Directory directly.

use std::sync::Arc;

use crate::adapters::cache::TtlCache;
use crate::domain::customer::Customer;
use crate::domain::foundation::{DomainError, TelegramId};
use crate::ports::CustomerRepository;

pub struct GetCustomerHandler {
    customers: Arc<dyn CustomerRepository>,
    cache: TtlCache<TelegramId, Customer>,
}

impl GetCustomerHandler {
    pub fn new(customers: Arc<dyn CustomerRepository>, cache: TtlCache<TelegramId, Customer>) -> Self {
        Self { customers, cache }
    }

    pub async fn handle(&self, telegram_id: TelegramId) -> Result<Option<Customer>, DomainError> {
        if let Some(customer) = self.cache.get(&telegram_id).await {
            return Ok(Some(customer));
        }

        let customer = self.customers.find_by_telegram_id(telegram_id).await?;
        if let Some(customer) = &customer {
            self.cache.insert(telegram_id, customer.clone()).await;
        }
        Ok(customer)
    }

    /// Drops the cached copy, e.g. after the front end changes the language.
    pub async fn invalidate(&self, telegram_id: TelegramId) {
        self.cache.remove(&telegram_id).await;
    }
}
