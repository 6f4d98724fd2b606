//! Store seams used by the bot. Postgres repositories implement them in
//! production; [`mem`] provides in-memory versions for tests.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{NewSubscription, QrAsset, Subscription, TrialRecord};
use crate::repositories::{
    AssetRepository, SubscriptionRepository, TrialRepository, UserRepository,
};

#[cfg(any(test, feature = "test-support"))]
pub mod mem;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns `false` when the user was already registered.
    async fn register(&self, id: i64, name: &str, username: Option<&str>) -> Result<bool>;
    async fn count(&self) -> Result<i64>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Most recent record with `end_date > now`.
    async fn find_active(&self, user_id: i64, now: DateTime<Utc>) -> Result<Option<Subscription>>;
    async fn insert(&self, new: NewSubscription) -> Result<Subscription>;
    async fn set_end_date(&self, id: i64, end_date: DateTime<Utc>) -> Result<()>;
    /// Sets `client_id` on the most recent active record. Returns the number
    /// of records touched (0 or 1).
    async fn set_client_id(&self, user_id: i64, now: DateTime<Utc>, client_id: &str) -> Result<u64>;
    async fn delete_for_user(&self, user_id: i64) -> Result<u64>;
    /// Records whose `end_date` lies in `(from, to]`.
    async fn ending_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Subscription>>;
    async fn count_active(&self, now: DateTime<Utc>) -> Result<i64>;
}

#[async_trait]
pub trait TrialStore: Send + Sync {
    async fn insert(&self, user_id: i64, start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Result<TrialRecord>;
    async fn find_by_user(&self, user_id: i64) -> Result<Option<TrialRecord>>;
    async fn count(&self) -> Result<i64>;
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn find(&self, user_id: i64) -> Result<Option<QrAsset>>;
    /// Inserts the asset, replacing any record the user already has.
    async fn save(&self, asset: QrAsset) -> Result<()>;
    /// Updates an existing record only. Returns whether one was found.
    async fn update_photo(&self, user_id: i64, photo_id: &str, pk: &str) -> Result<bool>;
}

#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub trials: Arc<dyn TrialStore>,
    pub assets: Arc<dyn AssetStore>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(UserRepository::new(pool.clone())),
            subscriptions: Arc::new(SubscriptionRepository::new(pool.clone())),
            trials: Arc::new(TrialRepository::new(pool.clone())),
            assets: Arc::new(AssetRepository::new(pool)),
        }
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn in_memory() -> (Self, mem::MemHandles) {
        let handles = mem::MemHandles::default();
        let stores = Self {
            users: Arc::new(handles.users.clone()),
            subscriptions: Arc::new(handles.subscriptions.clone()),
            trials: Arc::new(handles.trials.clone()),
            assets: Arc::new(handles.assets.clone()),
        };
        (stores, handles)
    }
}
