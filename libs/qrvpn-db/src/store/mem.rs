//! In-memory stores for unit tests.
//!
//! Enabled with the `test-support` feature:
//!
//! ```toml
//! [dev-dependencies]
//! qrvpn-db = { path = "...", features = ["test-support"] }
//! ```
//!
//! Every store is a cheap clone over shared state, so a test keeps the
//! [`MemHandles`] returned by [`Stores::in_memory`](super::Stores::in_memory)
//! to seed and inspect records while the code under test holds trait objects.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{AssetStore, SubscriptionStore, TrialStore, UserStore};
use crate::models::trial::TRIAL_FLAG_ON;
use crate::models::{BotUser, NewSubscription, QrAsset, Subscription, TrialRecord};

#[derive(Clone, Default)]
pub struct MemHandles {
    pub users: MemUserStore,
    pub subscriptions: MemSubscriptionStore,
    pub trials: MemTrialStore,
    pub assets: MemAssetStore,
}

// ── Users ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemUserStore {
    users: Arc<Mutex<HashMap<i64, BotUser>>>,
}

#[async_trait]
impl UserStore for MemUserStore {
    async fn register(&self, id: i64, name: &str, username: Option<&str>) -> Result<bool> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&id) {
            return Ok(false);
        }
        users.insert(
            id,
            BotUser {
                id,
                name: name.to_string(),
                username: username.map(str::to_string),
                joined_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.users.lock().unwrap().len() as i64)
    }
}

// ── Subscriptions ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemSubscriptionStore {
    inner: Arc<Mutex<MemSubscriptions>>,
}

#[derive(Default)]
struct MemSubscriptions {
    next_id: i64,
    rows: Vec<Subscription>,
}

impl MemSubscriptionStore {
    pub fn seed(&self, new: NewSubscription) -> Subscription {
        self.inner.lock().unwrap().push(new)
    }

    pub fn all(&self) -> Vec<Subscription> {
        self.inner.lock().unwrap().rows.clone()
    }

    pub fn for_user(&self, user_id: i64) -> Vec<Subscription> {
        self.all().into_iter().filter(|s| s.user_id == user_id).collect()
    }
}

impl MemSubscriptions {
    fn push(&mut self, new: NewSubscription) -> Subscription {
        self.next_id += 1;
        let sub = Subscription {
            id: self.next_id,
            user_id: new.user_id,
            start_date: new.start_date,
            end_date: new.end_date,
            client_id: new.client_id,
        };
        self.rows.push(sub.clone());
        sub
    }

    fn latest_active_mut(&mut self, user_id: i64, now: DateTime<Utc>) -> Option<&mut Subscription> {
        self.rows
            .iter_mut()
            .filter(|s| s.user_id == user_id && s.end_date > now)
            .max_by_key(|s| s.end_date)
    }
}

#[async_trait]
impl SubscriptionStore for MemSubscriptionStore {
    async fn find_active(&self, user_id: i64, now: DateTime<Utc>) -> Result<Option<Subscription>> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.latest_active_mut(user_id, now).map(|s| s.clone()))
    }

    async fn insert(&self, new: NewSubscription) -> Result<Subscription> {
        Ok(self.inner.lock().unwrap().push(new))
    }

    async fn set_end_date(&self, id: i64, end_date: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(sub) = inner.rows.iter_mut().find(|s| s.id == id) {
            sub.end_date = end_date;
        }
        Ok(())
    }

    async fn set_client_id(&self, user_id: i64, now: DateTime<Utc>, client_id: &str) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        match inner.latest_active_mut(user_id, now) {
            Some(sub) => {
                sub.client_id = Some(client_id.to_string());
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_for_user(&self, user_id: i64) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.rows.len();
        inner.rows.retain(|s| s.user_id != user_id);
        Ok((before - inner.rows.len()) as u64)
    }

    async fn ending_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Subscription>> {
        let inner = self.inner.lock().unwrap();
        let mut found: Vec<Subscription> = inner
            .rows
            .iter()
            .filter(|s| s.end_date > from && s.end_date <= to)
            .cloned()
            .collect();
        found.sort_by_key(|s| s.end_date);
        Ok(found)
    }

    async fn count_active(&self, now: DateTime<Utc>) -> Result<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.rows.iter().filter(|s| s.end_date > now).count() as i64)
    }
}

// ── Trials ────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemTrialStore {
    rows: Arc<Mutex<Vec<TrialRecord>>>,
}

impl MemTrialStore {
    pub fn all(&self) -> Vec<TrialRecord> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrialStore for MemTrialStore {
    async fn insert(&self, user_id: i64, start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Result<TrialRecord> {
        let mut rows = self.rows.lock().unwrap();
        let record = TrialRecord {
            id: rows.len() as i64 + 1,
            user_id,
            trial_flag: TRIAL_FLAG_ON.to_string(),
            start_date,
            end_date,
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Option<TrialRecord>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|t| t.user_id == user_id)
            .cloned())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.rows.lock().unwrap().len() as i64)
    }
}

// ── Assets ────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemAssetStore {
    rows: Arc<Mutex<HashMap<i64, QrAsset>>>,
}

impl MemAssetStore {
    pub fn seed(&self, asset: QrAsset) {
        self.rows.lock().unwrap().insert(asset.user_id, asset);
    }

    pub fn get(&self, user_id: i64) -> Option<QrAsset> {
        self.rows.lock().unwrap().get(&user_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl AssetStore for MemAssetStore {
    async fn find(&self, user_id: i64) -> Result<Option<QrAsset>> {
        Ok(self.get(user_id))
    }

    async fn save(&self, asset: QrAsset) -> Result<()> {
        self.seed(asset);
        Ok(())
    }

    async fn update_photo(&self, user_id: i64, photo_id: &str, pk: &str) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&user_id) {
            Some(asset) => {
                asset.photo_id = photo_id.to_string();
                asset.pk = pk.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
