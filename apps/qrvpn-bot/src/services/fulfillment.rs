//! Payment fulfillment: decides which QR image a paying user receives,
//! delivers it and records the result in the stores.
//!
//! No step here is transactional. Every store call and every send is a
//! suspension point, and a partially completed fulfillment (photo sent, store
//! not yet updated) is never rolled back.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use qrvpn_db::models::{NewSubscription, QrAsset, TrialRecord};
use qrvpn_db::Stores;
use teloxide::types::ChatId;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::bot::keyboards::ReplyKeyboards;
use crate::bot::outbound::{Outbox, Photo};
use crate::lexicon;
use crate::services::image_pool::{ImageHandle, ImagePool};

pub const TRIAL_DAYS: i64 = 3;

#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("image pool is exhausted")]
    PoolExhausted,
    #[error("pool image {path} is missing on disk")]
    ImageMissing { path: PathBuf },
    #[error("user {user_id} has no active subscription to renew")]
    NoActiveSubscription { user_id: i64 },
    #[error("image pool error: {0:#}")]
    Pool(#[source] anyhow::Error),
    #[error("store error: {0:#}")]
    Store(#[source] anyhow::Error),
    #[error("delivery error: {0:#}")]
    Delivery(#[source] anyhow::Error),
}

impl FulfillmentError {
    /// Whether the user already received an explanation for this failure.
    pub fn user_notified(&self) -> bool {
        matches!(self, Self::ImageMissing { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FulfillmentOutcome {
    IssuedNewImage { pk: String, client_id: String },
    ReusedImage,
    TextOnly,
}

#[derive(Debug, Clone, Copy)]
pub struct Recipient {
    pub user_id: i64,
    pub chat_id: ChatId,
}

impl Recipient {
    pub fn private(user_id: i64) -> Self {
        Self {
            user_id,
            chat_id: ChatId(user_id),
        }
    }
}

enum AssetWrite {
    Insert,
    Update,
}

pub struct PaymentFulfillment {
    stores: Stores,
    pool: Arc<dyn ImagePool>,
    utc_offset: FixedOffset,
}

impl PaymentFulfillment {
    pub fn new(stores: Stores, pool: Arc<dyn ImagePool>, utc_offset: FixedOffset) -> Self {
        Self { stores, pool, utc_offset }
    }

    /// Renewal of an already-verified payment. The caller guarantees the user
    /// holds an active subscription.
    pub async fn process_re_subscription(
        &self,
        outbox: &dyn Outbox,
        to: Recipient,
        end_date_str: &str,
        keyboards: &ReplyKeyboards,
        now: DateTime<Utc>,
    ) -> Result<FulfillmentOutcome, FulfillmentError> {
        let active = self
            .stores
            .subscriptions
            .find_active(to.user_id, now)
            .await
            .map_err(FulfillmentError::Store)?
            .ok_or(FulfillmentError::NoActiveSubscription { user_id: to.user_id })?;

        if active.has_assigned_client() {
            info!(
                "Renewal for user {} with assigned client {:?}, issuing a new image",
                to.user_id, active.client_id
            );
            let caption = lexicon::renewal_new_image_caption(end_date_str);
            return self
                .issue_new_image(outbox, to, &caption, keyboards, now, AssetWrite::Update)
                .await;
        }

        let asset = self
            .stores
            .assets
            .find(to.user_id)
            .await
            .map_err(FulfillmentError::Store)?;

        match asset.filter(|a| !a.photo_id.is_empty()) {
            Some(asset) => {
                outbox
                    .send_photo(
                        to.chat_id,
                        Photo::Cached(asset.photo_id),
                        &lexicon::renewal_cached_caption(end_date_str),
                        &keyboards.settings,
                    )
                    .await
                    .map_err(FulfillmentError::Delivery)?;
                info!("Renewal for user {}: reused cached QR {}", to.user_id, asset.pk);
                Ok(FulfillmentOutcome::ReusedImage)
            }
            None => {
                outbox
                    .send_text(
                        to.chat_id,
                        &lexicon::renewal_text(end_date_str),
                        Some(&keyboards.support),
                    )
                    .await
                    .map_err(FulfillmentError::Delivery)?;
                info!("Renewal for user {}: no cached QR, sent text confirmation", to.user_id);
                Ok(FulfillmentOutcome::TextOnly)
            }
        }
    }

    /// First paid subscription: always allocates a fresh image.
    pub async fn process_first_subscription(
        &self,
        outbox: &dyn Outbox,
        to: Recipient,
        end_date_str: &str,
        keyboards: &ReplyKeyboards,
        now: DateTime<Utc>,
    ) -> Result<FulfillmentOutcome, FulfillmentError> {
        let caption = lexicon::first_subscription_caption(end_date_str);
        self.issue_new_image(outbox, to, &caption, keyboards, now, AssetWrite::Insert)
            .await
    }

    /// Trial activation. The caller allocated `image` from the pool and owns
    /// the eligibility check.
    pub async fn process_trial(
        &self,
        outbox: &dyn Outbox,
        to: Recipient,
        keyboards: &ReplyKeyboards,
        client_id: &str,
        image: ImageHandle,
        now: DateTime<Utc>,
    ) -> Result<TrialRecord, FulfillmentError> {
        if !image_on_disk(&image).await {
            return Err(self.report_missing_image(outbox, to, keyboards, image).await);
        }

        let trial = match self.open_trial_window(to.user_id, client_id, now).await {
            Ok(trial) => trial,
            Err(e) => {
                self.pool.release(&image).await;
                return Err(e);
            }
        };

        let caption = lexicon::trial_caption(&lexicon::display_date(trial.end_date, self.utc_offset));
        let photo_id = match outbox
            .send_photo(to.chat_id, Photo::File(image.path.clone()), &caption, &keyboards.settings)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.pool.release(&image).await;
                return Err(FulfillmentError::Delivery(e));
            }
        };

        let pk = image.pk();
        let saved = self
            .stores
            .assets
            .save(QrAsset {
                user_id: to.user_id,
                photo_id,
                pk,
            })
            .await
            .map_err(FulfillmentError::Store);
        self.consume_delivered(image).await;
        saved?;

        info!("Trial activated for user {} until {}", to.user_id, trial.end_date);
        Ok(trial)
    }

    /// Replaces every subscription record of the user with a single trial window.
    async fn open_trial_window(
        &self,
        user_id: i64,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TrialRecord, FulfillmentError> {
        let removed = self
            .stores
            .subscriptions
            .delete_for_user(user_id)
            .await
            .map_err(FulfillmentError::Store)?;
        if removed > 0 {
            info!("Cleared {} subscription record(s) before trial for user {}", removed, user_id);
        }

        let end_date = now + Duration::days(TRIAL_DAYS);
        let trial = self
            .stores
            .trials
            .insert(user_id, now, end_date)
            .await
            .map_err(FulfillmentError::Store)?;
        self.stores
            .subscriptions
            .insert(NewSubscription {
                user_id,
                start_date: now,
                end_date,
                client_id: Some(client_id.to_string()),
            })
            .await
            .map_err(FulfillmentError::Store)?;
        Ok(trial)
    }

    async fn issue_new_image(
        &self,
        outbox: &dyn Outbox,
        to: Recipient,
        caption: &str,
        keyboards: &ReplyKeyboards,
        now: DateTime<Utc>,
        write: AssetWrite,
    ) -> Result<FulfillmentOutcome, FulfillmentError> {
        let image = self
            .pool
            .next()
            .await
            .map_err(FulfillmentError::Pool)?
            .ok_or(FulfillmentError::PoolExhausted)?;

        if !image_on_disk(&image).await {
            return Err(self.report_missing_image(outbox, to, keyboards, image).await);
        }

        let pk = image.pk();
        let client_id = image.client_id();

        let photo_id = match outbox
            .send_photo(to.chat_id, Photo::File(image.path.clone()), caption, &keyboards.settings)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.pool.release(&image).await;
                return Err(FulfillmentError::Delivery(e));
            }
        };

        // The image now belongs to this user whatever happens to the writes.
        let recorded = self.record_issue(to.user_id, &photo_id, &pk, &client_id, now, write).await;
        self.consume_delivered(image).await;
        recorded?;

        info!("Issued QR {} to user {}", client_id, to.user_id);
        Ok(FulfillmentOutcome::IssuedNewImage { pk, client_id })
    }

    async fn record_issue(
        &self,
        user_id: i64,
        photo_id: &str,
        pk: &str,
        client_id: &str,
        now: DateTime<Utc>,
        write: AssetWrite,
    ) -> Result<(), FulfillmentError> {
        match write {
            AssetWrite::Insert => {
                self.stores
                    .assets
                    .save(QrAsset {
                        user_id,
                        photo_id: photo_id.to_string(),
                        pk: pk.to_string(),
                    })
                    .await
                    .map_err(FulfillmentError::Store)?;
            }
            AssetWrite::Update => {
                let found = self
                    .stores
                    .assets
                    .update_photo(user_id, photo_id, pk)
                    .await
                    .map_err(FulfillmentError::Store)?;
                if !found {
                    warn!("No QR asset record to update for user {}", user_id);
                }
            }
        }

        let touched = self
            .stores
            .subscriptions
            .set_client_id(user_id, now, client_id)
            .await
            .map_err(FulfillmentError::Store)?;
        if touched == 0 {
            warn!("No active subscription to attach {} to for user {}", client_id, user_id);
        }
        Ok(())
    }

    async fn consume_delivered(&self, image: ImageHandle) {
        let path = image.path.clone();
        if let Err(e) = self.pool.consume(image).await {
            error!("Delivered image {} could not be removed from the pool: {:#}", path.display(), e);
        }
    }

    async fn report_missing_image(
        &self,
        outbox: &dyn Outbox,
        to: Recipient,
        keyboards: &ReplyKeyboards,
        image: ImageHandle,
    ) -> FulfillmentError {
        error!("Pool image {} vanished before delivery to user {}", image.path.display(), to.user_id);
        self.pool.release(&image).await;
        if let Err(e) = outbox
            .send_text(to.chat_id, lexicon::EMPTY_QR, Some(&keyboards.support))
            .await
        {
            error!("Failed to send missing-QR notice to user {}: {:#}", to.user_id, e);
        }
        FulfillmentError::ImageMissing { path: image.path }
    }
}

async fn image_on_disk(image: &ImageHandle) -> bool {
    tokio::fs::try_exists(&image.path).await.unwrap_or(false)
}

#[cfg(test)]
#[path = "fulfillment_tests.rs"]
mod tests;
