//! Customer repository port - the Customer Directory.

use async_trait::async_trait;

use crate::domain::customer::{Customer, CustomerPatch, NewCustomer};
use crate::domain::foundation::{CustomerId, DomainError, TelegramId, Timestamp};

/// Repository port for customer persistence. Customers are never deleted.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>, DomainError>;

    /// Primary lookup from the chat front end and the webhook.
    async fn find_by_telegram_id(
        &self,
        telegram_id: TelegramId,
    ) -> Result<Option<Customer>, DomainError>;

    /// Customers whose `expire_at` lies within `[start, end]`.
    async fn find_by_expiration_range(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Customer>, DomainError>;

    /// Insert a customer.
    ///
    /// # Errors
    ///
    /// - `CustomerExists` if the telegram id is already registered
    async fn create(&self, customer: NewCustomer) -> Result<Customer, DomainError>;

    /// Apply a typed partial update.
    ///
    /// # Errors
    ///
    /// - `CustomerNotFound` if no row was affected
    async fn update(&self, id: CustomerId, patch: CustomerPatch) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn CustomerRepository) {}
    }
}
