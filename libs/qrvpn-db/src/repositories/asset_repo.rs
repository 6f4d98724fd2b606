use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::QrAsset;
use crate::store::AssetStore;

#[derive(Debug, Clone)]
pub struct AssetRepository {
    pool: PgPool,
}

impl AssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssetStore for AssetRepository {
    async fn find(&self, user_id: i64) -> Result<Option<QrAsset>> {
        sqlx::query_as::<_, QrAsset>("SELECT user_id, photo_id, pk FROM qr_assets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch QR asset")
    }

    async fn save(&self, asset: QrAsset) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO qr_assets (user_id, photo_id, pk)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET photo_id = EXCLUDED.photo_id, pk = EXCLUDED.pk, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(asset.user_id)
        .bind(&asset.photo_id)
        .bind(&asset.pk)
        .execute(&self.pool)
        .await
        .context("Failed to save QR asset")?;
        Ok(())
    }

    async fn update_photo(&self, user_id: i64, photo_id: &str, pk: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE qr_assets SET photo_id = $1, pk = $2, updated_at = CURRENT_TIMESTAMP WHERE user_id = $3",
        )
        .bind(photo_id)
        .bind(pk)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("Failed to update QR asset")?;
        Ok(result.rows_affected() > 0)
    }
}
