use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Anything shorter is treated as "no permanent client assigned yet".
pub const ASSIGNED_CLIENT_MIN_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub client_id: Option<String>,
}

impl Subscription {
    /// Heuristic kept from the store layout: a `client_id` longer than ten
    /// bytes means a `Client_№<pk>` identifier has been issued.
    pub fn has_assigned_client(&self) -> bool {
        self.client_id
            .as_deref()
            .is_some_and(|id| id.len() > ASSIGNED_CLIENT_MIN_LEN)
    }
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub client_id: Option<String>,
}
