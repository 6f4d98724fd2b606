use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{NewSubscription, Subscription};
use crate::store::SubscriptionStore;

#[derive(Debug, Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for SubscriptionRepository {
    async fn find_active(&self, user_id: i64, now: DateTime<Utc>) -> Result<Option<Subscription>> {
        sqlx::query_as::<_, Subscription>(
            "SELECT id, user_id, start_date, end_date, client_id FROM subscriptions WHERE user_id = $1 AND end_date > $2 ORDER BY end_date DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch active subscription for user")
    }

    async fn insert(&self, new: NewSubscription) -> Result<Subscription> {
        sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (user_id, start_date, end_date, client_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, start_date, end_date, client_id
            "#,
        )
        .bind(new.user_id)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.client_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create subscription")
    }

    async fn set_end_date(&self, id: i64, end_date: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE subscriptions SET end_date = $1 WHERE id = $2")
            .bind(end_date)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update subscription end date")?;
        Ok(())
    }

    async fn set_client_id(&self, user_id: i64, now: DateTime<Utc>, client_id: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET client_id = $1
            WHERE id = (
                SELECT id FROM subscriptions
                WHERE user_id = $2 AND end_date > $3
                ORDER BY end_date DESC
                LIMIT 1
            )
            "#,
        )
        .bind(client_id)
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to set subscription client id")?;
        Ok(result.rows_affected())
    }

    async fn delete_for_user(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user subscriptions")?;
        Ok(result.rows_affected())
    }

    async fn ending_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Subscription>> {
        sqlx::query_as::<_, Subscription>(
            "SELECT id, user_id, start_date, end_date, client_id FROM subscriptions WHERE end_date > $1 AND end_date <= $2 ORDER BY end_date",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch subscriptions ending in window")
    }

    async fn count_active(&self, now: DateTime<Utc>) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE end_date > $1")
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count active subscriptions")
    }
}
