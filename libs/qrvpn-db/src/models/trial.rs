use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const TRIAL_FLAG_ON: &str = "on";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TrialRecord {
    pub id: i64,
    pub user_id: i64,
    pub trial_flag: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}
