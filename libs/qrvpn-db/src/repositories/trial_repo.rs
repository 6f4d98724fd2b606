use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::TrialRecord;
use crate::models::trial::TRIAL_FLAG_ON;
use crate::store::TrialStore;

#[derive(Debug, Clone)]
pub struct TrialRepository {
    pool: PgPool,
}

impl TrialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrialStore for TrialRepository {
    async fn insert(&self, user_id: i64, start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Result<TrialRecord> {
        sqlx::query_as::<_, TrialRecord>(
            r#"
            INSERT INTO trials (user_id, trial_flag, start_date, end_date)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, trial_flag, start_date, end_date
            "#,
        )
        .bind(user_id)
        .bind(TRIAL_FLAG_ON)
        .bind(start_date)
        .bind(end_date)
        .fetch_one(&self.pool)
        .await
        .context("Failed to record trial")
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Option<TrialRecord>> {
        sqlx::query_as::<_, TrialRecord>(
            "SELECT id, user_id, trial_flag, start_date, end_date FROM trials WHERE user_id = $1 ORDER BY start_date DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch trial for user")
    }

    async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM trials")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count trials")
    }
}
