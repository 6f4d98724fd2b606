use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};

/// Validates the URL scheme, opens a pool and applies pending migrations.
pub async fn init_db(database_url: &str) -> Result<PgPool> {
    check_database_url(database_url)?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    tracing::info!("Database ready, migrations applied");
    Ok(pool)
}

pub fn check_database_url(database_url: &str) -> Result<()> {
    if !database_url.starts_with("postgres://") && !database_url.starts_with("postgresql://") {
        return Err(anyhow::anyhow!(
            "DATABASE_URL must start with postgres:// or postgresql://"
        ));
    }
    Ok(())
}
