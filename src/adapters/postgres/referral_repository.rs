//! PostgreSQL implementation of ReferralRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{CustomerId, DomainError, ErrorCode, ReferralId, Timestamp};
use crate::domain::referral::Referral;
use crate::ports::ReferralRepository;

pub struct PostgresReferralRepository {
    pool: PgPool,
}

impl PostgresReferralRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReferralRow {
    id: i64,
    referrer_id: i64,
    referee_id: i64,
    used_at: DateTime<Utc>,
    bonus_granted: bool,
}

impl From<ReferralRow> for Referral {
    fn from(row: ReferralRow) -> Self {
        Referral {
            id: ReferralId::from_raw(row.id),
            referrer_id: CustomerId::from_raw(row.referrer_id),
            referee_id: CustomerId::from_raw(row.referee_id),
            used_at: Timestamp::from_datetime(row.used_at),
            bonus_granted: row.bonus_granted,
        }
    }
}

#[async_trait]
impl ReferralRepository for PostgresReferralRepository {
    async fn create(
        &self,
        referrer: CustomerId,
        referee: CustomerId,
    ) -> Result<Referral, DomainError> {
        Referral::validate_link(referrer, referee)?;

        let row: ReferralRow = sqlx::query_as(
            r#"
            INSERT INTO referral (referrer_id, referee_id)
            VALUES ($1, $2)
            RETURNING id, referrer_id, referee_id, used_at, bonus_granted
            "#,
        )
        .bind(referrer.as_i64())
        .bind(referee.as_i64())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("referral_referee_id_key") {
                    return DomainError::new(
                        ErrorCode::ReferralExists,
                        format!("Customer {} was already referred", referee),
                    );
                }
            }
            DomainError::database("Failed to create referral", e)
        })?;

        Ok(Referral::from(row))
    }

    async fn find_by_referee(&self, referee: CustomerId) -> Result<Option<Referral>, DomainError> {
        let row: Option<ReferralRow> = sqlx::query_as(
            r#"
            SELECT id, referrer_id, referee_id, used_at, bonus_granted
            FROM referral
            WHERE referee_id = $1
            "#,
        )
        .bind(referee.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to find referral", e))?;

        Ok(row.map(Referral::from))
    }

    async fn find_by_referrer(&self, referrer: CustomerId) -> Result<Vec<Referral>, DomainError> {
        let rows: Vec<ReferralRow> = sqlx::query_as(
            r#"
            SELECT id, referrer_id, referee_id, used_at, bonus_granted
            FROM referral
            WHERE referrer_id = $1
            ORDER BY used_at
            "#,
        )
        .bind(referrer.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to list referrals", e))?;

        Ok(rows.into_iter().map(Referral::from).collect())
    }

    async fn count_by_referrer(&self, referrer: CustomerId) -> Result<u64, DomainError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM referral WHERE referrer_id = $1")
            .bind(referrer.as_i64())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to count referrals", e))?;

        Ok(count.max(0) as u64)
    }

    async fn mark_bonus_granted(&self, id: ReferralId) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE referral SET bonus_granted = TRUE WHERE id = $1 AND bonus_granted = FALSE",
        )
        .bind(id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to mark referral bonus", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_bonus(&self, id: ReferralId) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE referral SET bonus_granted = FALSE WHERE id = $1 AND bonus_granted = TRUE",
        )
        .bind(id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to release referral bonus", e))?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_converts_to_referral() {
        let referral = Referral::from(ReferralRow {
            id: 9,
            referrer_id: 1,
            referee_id: 2,
            used_at: Utc::now(),
            bonus_granted: true,
        });
        assert_eq!(referral.id, ReferralId::from_raw(9));
        assert!(!referral.bonus_pending());
    }
}
