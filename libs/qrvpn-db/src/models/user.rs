use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BotUser {
    pub id: i64,
    pub name: String,
    pub username: Option<String>,
    pub joined_at: DateTime<Utc>,
}
