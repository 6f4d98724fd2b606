use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use crate::store::UserStore;

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn register(&self, id: i64, name: &str, username: Option<&str>) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO users (id, name, username) VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING",
        )
        .bind(id)
        .bind(name)
        .bind(username)
        .execute(&self.pool)
        .await
        .context("Failed to register user")?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")
    }
}
