use std::sync::Arc;

use anyhow::Result;

use qrvpn_db::Stores;

use crate::bot::keyboards::ReplyKeyboards;
use crate::bot::outbound::Outbox;
use crate::bot::throttle::Throttle;
use crate::config::Config;
use crate::services::fulfillment::PaymentFulfillment;
use crate::services::image_pool::ImagePool;
use crate::services::notification_service::NotificationService;
use crate::services::subscription_service::SubscriptionService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stores: Stores,
    pub pool: Arc<dyn ImagePool>,
    pub outbox: Arc<dyn Outbox>,
    pub fulfillment: Arc<PaymentFulfillment>,
    pub subscriptions: SubscriptionService,
    pub notifications: Arc<NotificationService>,
    pub keyboards: ReplyKeyboards,
    pub throttle: Throttle,
}

impl AppState {
    pub fn new(config: Config, stores: Stores, pool: Arc<dyn ImagePool>, outbox: Arc<dyn Outbox>) -> Result<Self> {
        let keyboards = ReplyKeyboards::new(&config.support_url);
        let throttle = Throttle::new(config.throttle_period)?;
        let notifications = NotificationService::new(
            stores.clone(),
            pool.clone(),
            outbox.clone(),
            config.reminder_days,
            config.admin_ids.clone(),
            config.admin_group,
            config.utc_offset,
        );
        Ok(Self {
            fulfillment: Arc::new(PaymentFulfillment::new(stores.clone(), pool.clone(), config.utc_offset)),
            subscriptions: SubscriptionService::new(stores.clone()),
            notifications: Arc::new(notifications),
            config: Arc::new(config),
            stores,
            pool,
            outbox,
            keyboards,
            throttle,
        })
    }
}
