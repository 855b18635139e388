//! PostgreSQL implementation of PurchaseRepository.
//!
//! Correlation is stored in per-backend nullable columns; the conditional
//! writes are single `UPDATE ... WHERE status ...` statements so concurrent
//! callers are serialized by row-level locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{CustomerId, DomainError, ErrorCode, PurchaseId, Timestamp};
use crate::domain::purchase::{
    BackendKind, InvoiceCorrelation, NewPurchase, Purchase, PurchasePatch, PurchaseStatus,
};
use crate::ports::PurchaseRepository;

const PURCHASE_COLUMNS: &str = "id, customer_id, backend, status, months, amount, currency, \
     crypto_invoice_id, crypto_invoice_url, gateway_payment_id, gateway_payment_url, \
     created_at, paid_at";

pub struct PostgresPurchaseRepository {
    pool: PgPool,
}

impl PostgresPurchaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a purchase.
#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    id: i64,
    customer_id: i64,
    backend: String,
    status: String,
    months: i32,
    amount: i64,
    currency: String,
    crypto_invoice_id: Option<i64>,
    crypto_invoice_url: Option<String>,
    gateway_payment_id: Option<Uuid>,
    gateway_payment_url: Option<String>,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<PurchaseRow> for Purchase {
    type Error = DomainError;

    fn try_from(row: PurchaseRow) -> Result<Self, Self::Error> {
        let backend = parse_backend(&row.backend)?;
        let status = parse_status(&row.status)?;
        let correlation = correlation_from_columns(
            row.crypto_invoice_id,
            row.crypto_invoice_url,
            row.gateway_payment_id,
            row.gateway_payment_url,
        );

        Ok(Purchase {
            id: PurchaseId::from_raw(row.id),
            customer_id: CustomerId::from_raw(row.customer_id),
            backend,
            status,
            months: row.months,
            amount: row.amount,
            currency: row.currency,
            correlation,
            created_at: Timestamp::from_datetime(row.created_at),
            paid_at: row.paid_at.map(Timestamp::from_datetime),
        })
    }
}

fn parse_backend(s: &str) -> Result<BackendKind, DomainError> {
    s.parse::<BackendKind>().map_err(|_| {
        DomainError::new(ErrorCode::DatabaseError, format!("Invalid backend value: {}", s))
    })
}

fn parse_status(s: &str) -> Result<PurchaseStatus, DomainError> {
    s.parse::<PurchaseStatus>().map_err(|_| {
        DomainError::new(ErrorCode::DatabaseError, format!("Invalid status value: {}", s))
    })
}

fn correlation_from_columns(
    crypto_invoice_id: Option<i64>,
    crypto_invoice_url: Option<String>,
    gateway_payment_id: Option<Uuid>,
    gateway_payment_url: Option<String>,
) -> InvoiceCorrelation {
    if let Some(invoice_id) = crypto_invoice_id {
        return InvoiceCorrelation::Crypto {
            invoice_id,
            invoice_url: crypto_invoice_url.unwrap_or_default(),
        };
    }
    if let Some(payment_id) = gateway_payment_id {
        return InvoiceCorrelation::Gateway {
            payment_id,
            payment_url: gateway_payment_url.unwrap_or_default(),
        };
    }
    InvoiceCorrelation::None
}

/// Splits a correlation into its four storage columns.
fn correlation_to_columns(
    correlation: &InvoiceCorrelation,
) -> (Option<i64>, Option<String>, Option<Uuid>, Option<String>) {
    match correlation {
        InvoiceCorrelation::None => (None, None, None, None),
        InvoiceCorrelation::Crypto {
            invoice_id,
            invoice_url,
        } => (Some(*invoice_id), Some(invoice_url.clone()), None, None),
        InvoiceCorrelation::Gateway {
            payment_id,
            payment_url,
        } => (None, None, Some(*payment_id), Some(payment_url.clone())),
    }
}

fn not_found(id: PurchaseId) -> DomainError {
    DomainError::new(ErrorCode::PurchaseNotFound, format!("Purchase {} not found", id))
        .with_detail("purchase_id", id.to_string())
}

#[async_trait]
impl PurchaseRepository for PostgresPurchaseRepository {
    async fn create(&self, purchase: NewPurchase) -> Result<PurchaseId, DomainError> {
        purchase.validate()?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO purchase (customer_id, backend, status, months, amount, currency)
            VALUES ($1, $2, 'new', $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(purchase.customer_id.as_i64())
        .bind(purchase.backend.as_str())
        .bind(purchase.months)
        .bind(purchase.amount)
        .bind(&purchase.currency)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to create purchase", e))?;

        Ok(PurchaseId::from_raw(id))
    }

    async fn find_by_id(&self, id: PurchaseId) -> Result<Option<Purchase>, DomainError> {
        let query = format!("SELECT {} FROM purchase WHERE id = $1", PURCHASE_COLUMNS);
        let row: Option<PurchaseRow> = sqlx::query_as(&query)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to find purchase", e))?;

        row.map(Purchase::try_from).transpose()
    }

    async fn find_by_backend_and_status(
        &self,
        backend: BackendKind,
        status: PurchaseStatus,
    ) -> Result<Vec<Purchase>, DomainError> {
        let query = format!(
            "SELECT {} FROM purchase WHERE backend = $1 AND status = $2 ORDER BY id",
            PURCHASE_COLUMNS
        );
        let rows: Vec<PurchaseRow> = sqlx::query_as(&query)
            .bind(backend.as_str())
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to list purchases", e))?;

        rows.into_iter().map(Purchase::try_from).collect()
    }

    async fn find_latest_open_by_customers(
        &self,
        backend: BackendKind,
        customers: &[CustomerId],
    ) -> Result<Vec<Purchase>, DomainError> {
        if customers.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = customers.iter().map(|c| c.as_i64()).collect();
        let query = format!(
            r#"
            SELECT DISTINCT ON (customer_id) {}
            FROM purchase
            WHERE backend = $1 AND status <> 'cancelled' AND customer_id = ANY($2)
            ORDER BY customer_id, created_at DESC, id DESC
            "#,
            PURCHASE_COLUMNS
        );
        let rows: Vec<PurchaseRow> = sqlx::query_as(&query)
            .bind(backend.as_str())
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to find purchases by customers", e))?;

        rows.into_iter().map(Purchase::try_from).collect()
    }

    async fn update(&self, id: PurchaseId, patch: PurchasePatch) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin transaction", e))?;

        let query = format!("SELECT {} FROM purchase WHERE id = $1 FOR UPDATE", PURCHASE_COLUMNS);
        let row: Option<PurchaseRow> = sqlx::query_as(&query)
            .bind(id.as_i64())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| DomainError::database("Failed to lock purchase", e))?;

        let mut purchase = row.map(Purchase::try_from).transpose()?.ok_or_else(|| not_found(id))?;
        if patch.is_empty() {
            return Ok(());
        }
        purchase.apply(&patch)?;

        let (crypto_id, crypto_url, gateway_id, gateway_url) =
            correlation_to_columns(&purchase.correlation);
        let result = sqlx::query(
            r#"
            UPDATE purchase SET
                status = $2,
                crypto_invoice_id = $3,
                crypto_invoice_url = $4,
                gateway_payment_id = $5,
                gateway_payment_url = $6,
                paid_at = $7
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .bind(purchase.status.as_str())
        .bind(crypto_id)
        .bind(crypto_url)
        .bind(gateway_id)
        .bind(gateway_url)
        .bind(purchase.paid_at.map(|t| *t.as_datetime()))
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to update purchase", e))?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit purchase update", e))?;
        Ok(())
    }

    async fn mark_paid_if_pending(
        &self,
        id: PurchaseId,
        paid_at: Timestamp,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE purchase SET status = 'paid', paid_at = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id.as_i64())
        .bind(paid_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to mark purchase paid", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn cancel_if_open(&self, id: PurchaseId) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE purchase SET status = 'cancelled'
            WHERE id = $1 AND status IN ('new', 'pending')
            "#,
        )
        .bind(id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to cancel purchase", e))?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_accepts_stored_values() {
        assert_eq!(parse_status("new").unwrap(), PurchaseStatus::New);
        assert_eq!(parse_status("pending").unwrap(), PurchaseStatus::Pending);
        assert_eq!(parse_status("paid").unwrap(), PurchaseStatus::Paid);
        assert_eq!(parse_status("cancelled").unwrap(), PurchaseStatus::Cancelled);
    }

    #[test]
    fn parse_status_rejects_unknown_values() {
        let err = parse_status("refunded").unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn parse_backend_accepts_stored_values() {
        assert_eq!(parse_backend("crypto").unwrap(), BackendKind::Crypto);
        assert_eq!(parse_backend("in_chat").unwrap(), BackendKind::InChat);
        assert!(parse_backend("tribute").is_err());
    }

    #[test]
    fn correlation_columns_round_trip() {
        let payment_id = Uuid::new_v4();
        for correlation in [
            InvoiceCorrelation::None,
            InvoiceCorrelation::Crypto {
                invoice_id: 77,
                invoice_url: "https://t.me/CryptoBot?start=IV77".to_string(),
            },
            InvoiceCorrelation::Gateway {
                payment_id,
                payment_url: "https://yoomoney.ru/checkout".to_string(),
            },
        ] {
            let (a, b, c, d) = correlation_to_columns(&correlation);
            assert_eq!(correlation_from_columns(a, b, c, d), correlation);
        }
    }

    #[test]
    fn row_converts_to_purchase() {
        let now = Utc::now();
        let row = PurchaseRow {
            id: 5,
            customer_id: 2,
            backend: "gateway".to_string(),
            status: "pending".to_string(),
            months: 3,
            amount: 900,
            currency: "RUB".to_string(),
            crypto_invoice_id: None,
            crypto_invoice_url: None,
            gateway_payment_id: Some(Uuid::nil()),
            gateway_payment_url: Some("https://pay".to_string()),
            created_at: now,
            paid_at: None,
        };
        let purchase = Purchase::try_from(row).unwrap();
        assert_eq!(purchase.id, PurchaseId::from_raw(5));
        assert_eq!(purchase.backend, BackendKind::Gateway);
        assert_eq!(purchase.access_days(), 90);
        assert_eq!(
            purchase.correlation.external_id(),
            Some(Uuid::nil().to_string())
        );
    }
}
