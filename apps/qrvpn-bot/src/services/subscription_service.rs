use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use qrvpn_db::models::NewSubscription;
use qrvpn_db::Stores;
use tracing::info;

use crate::models::plan::Plan;

/// Which fulfillment path a verified payment takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentKind {
    First,
    Renewal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedPayment {
    pub kind: PaymentKind,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialEligibility {
    Eligible,
    AlreadyUsed,
    HasActiveSubscription,
}

/// Subscription bookkeeping that happens before any QR image is delivered.
#[derive(Clone)]
pub struct SubscriptionService {
    stores: Stores,
}

impl SubscriptionService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Records a paid plan.
    ///
    /// An active subscription is extended from its current end date,
    /// otherwise a new window starts now. The payment is a renewal when the
    /// user already holds a QR: an assigned client on the active record or a
    /// cached image from an earlier subscription or trial. A user whose
    /// earlier fulfillment never delivered an image is treated as new, so
    /// one gets allocated.
    pub async fn apply_payment(&self, user_id: i64, plan: Plan, now: DateTime<Utc>) -> Result<AppliedPayment> {
        let days = Duration::days(plan.days());

        if let Some(active) = self.stores.subscriptions.find_active(user_id, now).await? {
            let end_date = active.end_date + days;
            self.stores
                .subscriptions
                .set_end_date(active.id, end_date)
                .await
                .with_context(|| format!("Failed to extend subscription {}", active.id))?;
            let kind = if active.has_assigned_client() || self.owns_image(user_id).await? {
                PaymentKind::Renewal
            } else {
                PaymentKind::First
            };
            info!(
                "Extended subscription {} of user {} by {} days until {} ({:?})",
                active.id,
                user_id,
                plan.days(),
                end_date,
                kind
            );
            return Ok(AppliedPayment { kind, end_date });
        }

        let end_date = now + days;
        let sub = self
            .stores
            .subscriptions
            .insert(NewSubscription {
                user_id,
                start_date: now,
                end_date,
                client_id: None,
            })
            .await
            .with_context(|| format!("Failed to create subscription for user {}", user_id))?;

        let kind = if self.owns_image(user_id).await? {
            PaymentKind::Renewal
        } else {
            PaymentKind::First
        };
        info!(
            "Created subscription {} for user {} ({:?}) until {}",
            sub.id, user_id, kind, end_date
        );
        Ok(AppliedPayment { kind, end_date })
    }

    async fn owns_image(&self, user_id: i64) -> Result<bool> {
        Ok(self
            .stores
            .assets
            .find(user_id)
            .await?
            .is_some_and(|asset| !asset.photo_id.is_empty()))
    }

    pub async fn trial_eligibility(&self, user_id: i64, now: DateTime<Utc>) -> Result<TrialEligibility> {
        if self.stores.trials.find_by_user(user_id).await?.is_some() {
            return Ok(TrialEligibility::AlreadyUsed);
        }
        if self.stores.subscriptions.find_active(user_id, now).await?.is_some() {
            return Ok(TrialEligibility::HasActiveSubscription);
        }
        Ok(TrialEligibility::Eligible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrvpn_db::models::QrAsset;

    const USER: i64 = 77;

    #[tokio::test]
    async fn payment_without_history_starts_a_first_subscription() {
        let (stores, mem) = Stores::in_memory();
        let service = SubscriptionService::new(stores);
        let now = Utc::now();

        let applied = service.apply_payment(USER, Plan::ThreeMonths, now).await.unwrap();

        assert_eq!(applied.kind, PaymentKind::First);
        assert_eq!(applied.end_date, now + Duration::days(90));
        let subs = mem.subscriptions.for_user(USER);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].start_date, now);
        assert_eq!(subs[0].client_id, None);
    }

    #[tokio::test]
    async fn payment_with_active_subscription_extends_it() {
        let (stores, mem) = Stores::in_memory();
        let service = SubscriptionService::new(stores);
        let now = Utc::now();
        let existing = mem.subscriptions.seed(NewSubscription {
            user_id: USER,
            start_date: now - Duration::days(20),
            end_date: now + Duration::days(10),
            client_id: Some("Client_№42".into()),
        });

        let applied = service.apply_payment(USER, Plan::Year, now).await.unwrap();

        assert_eq!(applied.kind, PaymentKind::Renewal);
        assert_eq!(applied.end_date, existing.end_date + Duration::days(365));
        let subs = mem.subscriptions.for_user(USER);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].end_date, applied.end_date);
        assert_eq!(subs[0].client_id.as_deref(), Some("Client_№42"));
    }

    #[tokio::test]
    async fn active_subscription_without_any_issued_image_is_fulfilled_as_first() {
        let (stores, mem) = Stores::in_memory();
        let service = SubscriptionService::new(stores);
        let now = Utc::now();
        // An earlier payment recorded the window but the pool was empty.
        let existing = mem.subscriptions.seed(NewSubscription {
            user_id: USER,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(89),
            client_id: None,
        });

        let applied = service.apply_payment(USER, Plan::ThreeMonths, now).await.unwrap();

        assert_eq!(applied.kind, PaymentKind::First);
        assert_eq!(applied.end_date, existing.end_date + Duration::days(90));
        assert_eq!(mem.subscriptions.for_user(USER).len(), 1);
    }

    #[tokio::test]
    async fn active_subscription_with_cached_image_renews() {
        let (stores, mem) = Stores::in_memory();
        let service = SubscriptionService::new(stores);
        let now = Utc::now();
        mem.subscriptions.seed(NewSubscription {
            user_id: USER,
            start_date: now,
            end_date: now + Duration::days(30),
            client_id: None,
        });
        mem.assets.seed(QrAsset {
            user_id: USER,
            photo_id: "photo".into(),
            pk: "3".into(),
        });

        let applied = service.apply_payment(USER, Plan::ThreeMonths, now).await.unwrap();

        assert_eq!(applied.kind, PaymentKind::Renewal);
    }

    #[tokio::test]
    async fn lapsed_user_with_cached_image_renews() {
        let (stores, mem) = Stores::in_memory();
        let service = SubscriptionService::new(stores);
        let now = Utc::now();
        mem.subscriptions.seed(NewSubscription {
            user_id: USER,
            start_date: now - Duration::days(100),
            end_date: now - Duration::days(10),
            client_id: Some("Client_№3".into()),
        });
        mem.assets.seed(QrAsset {
            user_id: USER,
            photo_id: "photo".into(),
            pk: "3".into(),
        });

        let applied = service.apply_payment(USER, Plan::SixMonths, now).await.unwrap();

        assert_eq!(applied.kind, PaymentKind::Renewal);
        assert_eq!(applied.end_date, now + Duration::days(180));
        assert_eq!(mem.subscriptions.for_user(USER).len(), 2);
    }

    #[tokio::test]
    async fn trial_is_offered_once_and_only_without_subscription() {
        let (stores, mem) = Stores::in_memory();
        let service = SubscriptionService::new(stores.clone());
        let now = Utc::now();

        assert_eq!(service.trial_eligibility(USER, now).await.unwrap(), TrialEligibility::Eligible);

        mem.subscriptions.seed(NewSubscription {
            user_id: USER,
            start_date: now,
            end_date: now + Duration::days(30),
            client_id: None,
        });
        assert_eq!(
            service.trial_eligibility(USER, now).await.unwrap(),
            TrialEligibility::HasActiveSubscription
        );

        stores.trials.insert(USER, now, now + Duration::days(3)).await.unwrap();
        assert_eq!(
            service.trial_eligibility(USER, now + Duration::days(60)).await.unwrap(),
            TrialEligibility::AlreadyUsed
        );
    }
}
