//! PostgreSQL implementation of CustomerRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::customer::{Customer, CustomerPatch, NewCustomer};
use crate::domain::foundation::{CustomerId, DomainError, ErrorCode, TelegramId, Timestamp};
use crate::ports::CustomerRepository;

pub struct PostgresCustomerRepository {
    pool: PgPool,
}

impl PostgresCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i64,
    telegram_id: i64,
    language: String,
    expire_at: Option<DateTime<Utc>>,
    subscription_link: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: CustomerId::from_raw(row.id),
            telegram_id: TelegramId::from_raw(row.telegram_id),
            language: row.language,
            expire_at: row.expire_at.map(Timestamp::from_datetime),
            subscription_link: row.subscription_link,
            created_at: Timestamp::from_datetime(row.created_at),
        }
    }
}

#[async_trait]
impl CustomerRepository for PostgresCustomerRepository {
    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>, DomainError> {
        let row: Option<CustomerRow> = sqlx::query_as(
            r#"
            SELECT id, telegram_id, language, expire_at, subscription_link, created_at
            FROM customer
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to find customer", e))?;

        Ok(row.map(Customer::from))
    }

    async fn find_by_telegram_id(
        &self,
        telegram_id: TelegramId,
    ) -> Result<Option<Customer>, DomainError> {
        let row: Option<CustomerRow> = sqlx::query_as(
            r#"
            SELECT id, telegram_id, language, expire_at, subscription_link, created_at
            FROM customer
            WHERE telegram_id = $1
            "#,
        )
        .bind(telegram_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to find customer by telegram id", e))?;

        Ok(row.map(Customer::from))
    }

    async fn find_by_expiration_range(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Customer>, DomainError> {
        let rows: Vec<CustomerRow> = sqlx::query_as(
            r#"
            SELECT id, telegram_id, language, expire_at, subscription_link, created_at
            FROM customer
            WHERE expire_at IS NOT NULL AND expire_at >= $1 AND expire_at <= $2
            ORDER BY expire_at
            "#,
        )
        .bind(start.as_datetime())
        .bind(end.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to find expiring customers", e))?;

        Ok(rows.into_iter().map(Customer::from).collect())
    }

    async fn create(&self, customer: NewCustomer) -> Result<Customer, DomainError> {
        customer.validate()?;

        let row: CustomerRow = sqlx::query_as(
            r#"
            INSERT INTO customer (telegram_id, language)
            VALUES ($1, $2)
            RETURNING id, telegram_id, language, expire_at, subscription_link, created_at
            "#,
        )
        .bind(customer.telegram_id.as_i64())
        .bind(&customer.language)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("customer_telegram_id_key") {
                    return DomainError::new(
                        ErrorCode::CustomerExists,
                        format!(
                            "Customer with telegram id {} already exists",
                            customer.telegram_id
                        ),
                    );
                }
            }
            DomainError::database("Failed to create customer", e)
        })?;

        Ok(Customer::from(row))
    }

    async fn update(&self, id: CustomerId, patch: CustomerPatch) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE customer SET
                expire_at = COALESCE($2, expire_at),
                subscription_link = COALESCE($3, subscription_link),
                language = COALESCE($4, language)
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .bind(patch.expire_at.map(|t| *t.as_datetime()))
        .bind(patch.subscription_link)
        .bind(patch.language)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to update customer", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::CustomerNotFound,
                format!("Customer {} not found", id),
            ));
        }

        Ok(())
    }
}
