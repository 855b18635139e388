//! In-memory Customer Directory.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use crate::domain::customer::{Customer, CustomerPatch, NewCustomer};
use crate::domain::foundation::{CustomerId, DomainError, ErrorCode, TelegramId, Timestamp};
use crate::ports::CustomerRepository;

#[derive(Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<BTreeMap<CustomerId, Customer>>,
    next_id: AtomicI64,
}

impl InMemoryCustomerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a fully built customer, replacing any with the same id.
    pub async fn insert(&self, customer: Customer) {
        self.next_id
            .fetch_max(customer.id.as_i64(), Ordering::SeqCst);
        self.customers.write().await.insert(customer.id, customer);
    }
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>, DomainError> {
        Ok(self.customers.read().await.get(&id).cloned())
    }

    async fn find_by_telegram_id(
        &self,
        telegram_id: TelegramId,
    ) -> Result<Option<Customer>, DomainError> {
        Ok(self
            .customers
            .read()
            .await
            .values()
            .find(|c| c.telegram_id == telegram_id)
            .cloned())
    }

    async fn find_by_expiration_range(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Customer>, DomainError> {
        Ok(self
            .customers
            .read()
            .await
            .values()
            .filter(|c| {
                c.expire_at
                    .map(|at| !at.is_before(&start) && !at.is_after(&end))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn create(&self, customer: NewCustomer) -> Result<Customer, DomainError> {
        customer.validate()?;
        let mut customers = self.customers.write().await;
        if customers.values().any(|c| c.telegram_id == customer.telegram_id) {
            return Err(DomainError::new(
                ErrorCode::CustomerExists,
                format!("Customer with telegram id {} already exists", customer.telegram_id),
            ));
        }
        let id = CustomerId::from_raw(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let created = customer.into_customer(id, Timestamp::now());
        customers.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: CustomerId, patch: CustomerPatch) -> Result<(), DomainError> {
        let mut customers = self.customers.write().await;
        let customer = customers.get_mut(&id).ok_or_else(|| {
            DomainError::new(ErrorCode::CustomerNotFound, format!("Customer {} not found", id))
                .with_detail("customer_id", id.to_string())
        })?;
        customer.apply(&patch);
        Ok(())
    }
}
