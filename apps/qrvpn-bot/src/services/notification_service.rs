use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use qrvpn_db::Stores;
use teloxide::types::ChatId;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::bot::outbound::Outbox;
use crate::lexicon;
use crate::services::image_pool::ImagePool;

/// Below this many unused images the admin report carries a warning.
pub const LOW_POOL_THRESHOLD: usize = 10;

const DAY: StdDuration = StdDuration::from_secs(24 * 60 * 60);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReminderStats {
    pub reminded: usize,
    pub expired: usize,
    pub failed: usize,
}

/// What the user was trying to get when the image pool ran dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolShortfall {
    Payment,
    Trial,
}

/// Reminders for users and reports for admins.
pub struct NotificationService {
    stores: Stores,
    pool: Arc<dyn ImagePool>,
    outbox: Arc<dyn Outbox>,
    reminder_days: i64,
    admin_ids: Vec<i64>,
    admin_group: Option<ChatId>,
    utc_offset: FixedOffset,
}

impl NotificationService {
    pub fn new(
        stores: Stores,
        pool: Arc<dyn ImagePool>,
        outbox: Arc<dyn Outbox>,
        reminder_days: i64,
        admin_ids: Vec<i64>,
        admin_group: Option<ChatId>,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            stores,
            pool,
            outbox,
            reminder_days,
            admin_ids,
            admin_group,
            utc_offset,
        }
    }

    /// Runs the daily jobs until a shutdown signal arrives. The first tick
    /// fires immediately.
    pub async fn start(&self, mut shutdown: broadcast::Receiver<()>) {
        info!("Starting notification service (daily)...");
        let mut interval = tokio::time::interval(DAY);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Utc::now();
                    match self.remind_expiring(now).await {
                        Ok(stats) => info!(
                            "Daily reminders: {} expiring, {} expired, {} failed",
                            stats.reminded, stats.expired, stats.failed
                        ),
                        Err(e) => error!("Daily reminder job failed: {:#}", e),
                    }
                    if let Err(e) = self.report_to_admin_group(now).await {
                        error!("Daily admin report failed: {:#}", e);
                    }
                }
                _ = shutdown.recv() => {
                    info!("Notification service received shutdown signal, stopping...");
                    break;
                }
            }
        }
    }

    /// Reminds users whose subscription ends on the `reminder_days`-th day from
    /// now and tells users whose subscription ended in the last 24 hours.
    pub async fn remind_expiring(&self, now: DateTime<Utc>) -> Result<ReminderStats> {
        let mut stats = ReminderStats::default();
        let mut seen = HashSet::new();

        let window_end = now + Duration::days(self.reminder_days);
        let expiring = self
            .stores
            .subscriptions
            .ending_between(window_end - Duration::days(1), window_end)
            .await?;
        for sub in expiring {
            if !seen.insert(sub.user_id) {
                continue;
            }
            let text = lexicon::expiring_reminder(&lexicon::display_date(sub.end_date, self.utc_offset));
            match self.outbox.send_text(ChatId(sub.user_id), &text, None).await {
                Ok(()) => stats.reminded += 1,
                Err(e) => {
                    stats.failed += 1;
                    warn!("Failed to remind user {}: {:#}", sub.user_id, e);
                }
            }
        }

        let expired = self
            .stores
            .subscriptions
            .ending_between(now - Duration::days(1), now)
            .await?;
        for sub in expired {
            if !seen.insert(sub.user_id) {
                continue;
            }
            if self.stores.subscriptions.find_active(sub.user_id, now).await?.is_some() {
                continue;
            }
            match self
                .outbox
                .send_text(ChatId(sub.user_id), lexicon::EXPIRED_NOTICE, None)
                .await
            {
                Ok(()) => stats.expired += 1,
                Err(e) => {
                    stats.failed += 1;
                    warn!("Failed to notify user {} about expiry: {:#}", sub.user_id, e);
                }
            }
        }

        Ok(stats)
    }

    /// Posts the daily summary to the admin group. Returns `false` when no
    /// group is configured.
    pub async fn report_to_admin_group(&self, now: DateTime<Utc>) -> Result<bool> {
        let Some(group) = self.admin_group else {
            return Ok(false);
        };

        let users = self.stores.users.count().await?;
        let active = self.stores.subscriptions.count_active(now).await?;
        let trials = self.stores.trials.count().await?;
        let pool_left = self.pool.remaining().await?;

        self.outbox
            .send_text(group, &lexicon::admin_report(users, active, trials, pool_left), None)
            .await?;
        if pool_left < LOW_POOL_THRESHOLD {
            warn!("Image pool is running low: {} left", pool_left);
            self.outbox
                .send_text(group, &lexicon::pool_low_alert(pool_left), None)
                .await?;
        }
        Ok(true)
    }

    /// Tells admins that a user got no image because the pool is empty.
    pub async fn alert_pool_exhausted(&self, user_id: i64, shortfall: PoolShortfall) {
        let text = match shortfall {
            PoolShortfall::Payment => lexicon::pool_exhausted_payment_alert(user_id),
            PoolShortfall::Trial => lexicon::pool_exhausted_trial_alert(user_id),
        };
        match self.admin_group {
            Some(group) => {
                if let Err(e) = self.outbox.send_text(group, &text, None).await {
                    error!("Failed to alert admin group about empty pool: {:#}", e);
                }
            }
            None => {
                self.broadcast_admins(&text).await;
            }
        }
    }

    /// Sends `text` to every admin. Returns how many messages went out.
    pub async fn broadcast_admins(&self, text: &str) -> usize {
        let mut sent = 0;
        for &admin in &self.admin_ids {
            match self.outbox.send_text(ChatId(admin), text, None).await {
                Ok(()) => sent += 1,
                Err(e) => warn!("Failed to message admin {}: {:#}", admin, e),
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{moscow, stage_images, RecordingOutbox, Sent};
    use crate::services::image_pool::DirImagePool;
    use qrvpn_db::models::NewSubscription;

    const GROUP: ChatId = ChatId(-100500);

    fn service(
        stores: Stores,
        pool_dir: &std::path::Path,
        outbox: &RecordingOutbox,
        group: Option<ChatId>,
    ) -> NotificationService {
        NotificationService::new(
            stores,
            Arc::new(DirImagePool::new(pool_dir)),
            Arc::new(outbox.clone()),
            3,
            vec![1, 2],
            group,
            moscow(),
        )
    }

    fn ending(user_id: i64, end_date: DateTime<Utc>) -> NewSubscription {
        NewSubscription {
            user_id,
            start_date: end_date - Duration::days(90),
            end_date,
            client_id: None,
        }
    }

    #[tokio::test]
    async fn reminds_only_subscriptions_ending_on_the_reminder_day() {
        let dir = tempfile::tempdir().unwrap();
        let (stores, mem) = Stores::in_memory();
        let outbox = RecordingOutbox::new();
        let svc = service(stores, dir.path(), &outbox, None);
        let now = Utc::now();

        mem.subscriptions.seed(ending(10, now + Duration::days(3))); // boundary, included
        mem.subscriptions.seed(ending(11, now + Duration::hours(60)));
        mem.subscriptions.seed(ending(12, now + Duration::days(2))); // boundary, excluded
        mem.subscriptions.seed(ending(13, now + Duration::days(20)));

        let stats = svc.remind_expiring(now).await.unwrap();

        assert_eq!(stats.reminded, 2);
        let chats: Vec<ChatId> = outbox
            .sent()
            .into_iter()
            .map(|s| match s {
                Sent::Text { chat_id, .. } => chat_id,
                Sent::Photo { chat_id, .. } => chat_id,
            })
            .collect();
        assert_eq!(chats, vec![ChatId(11), ChatId(10)]);
    }

    #[tokio::test]
    async fn expired_notice_skips_users_who_already_renewed() {
        let dir = tempfile::tempdir().unwrap();
        let (stores, mem) = Stores::in_memory();
        let outbox = RecordingOutbox::new();
        let svc = service(stores, dir.path(), &outbox, None);
        let now = Utc::now();

        mem.subscriptions.seed(ending(20, now - Duration::hours(5)));
        mem.subscriptions.seed(ending(21, now - Duration::hours(5)));
        mem.subscriptions.seed(ending(21, now + Duration::days(40)));
        mem.subscriptions.seed(ending(22, now - Duration::days(3)));

        let stats = svc.remind_expiring(now).await.unwrap();

        assert_eq!(stats.expired, 1);
        assert_eq!(
            outbox.sent(),
            vec![Sent::Text {
                chat_id: ChatId(20),
                text: lexicon::EXPIRED_NOTICE.to_string()
            }]
        );
    }

    #[tokio::test]
    async fn admin_report_warns_when_pool_runs_low() {
        let dir = tempfile::tempdir().unwrap();
        stage_images(dir.path(), &["1.png", "2.png"]);
        let (stores, _mem) = Stores::in_memory();
        stores.users.register(5, "Ann", None).await.unwrap();
        let outbox = RecordingOutbox::new();
        let svc = service(stores, dir.path(), &outbox, Some(GROUP));

        assert!(svc.report_to_admin_group(Utc::now()).await.unwrap());

        let texts = outbox.texts();
        assert_eq!(texts, vec![lexicon::admin_report(1, 0, 0, 2), lexicon::pool_low_alert(2)]);
    }

    #[tokio::test]
    async fn admin_report_needs_a_group() {
        let dir = tempfile::tempdir().unwrap();
        let (stores, _mem) = Stores::in_memory();
        let outbox = RecordingOutbox::new();
        let svc = service(stores, dir.path(), &outbox, None);

        assert!(!svc.report_to_admin_group(Utc::now()).await.unwrap());
        assert!(outbox.sent().is_empty());
    }

    #[tokio::test]
    async fn reminder_shows_the_end_date_in_local_time() {
        let dir = tempfile::tempdir().unwrap();
        let (stores, mem) = Stores::in_memory();
        let outbox = RecordingOutbox::new();
        let svc = service(stores, dir.path(), &outbox, None);
        let now = DateTime::parse_from_rfc3339("2026-03-04T23:30:00Z")
            .unwrap()
            .with_timezone(&Utc);

        mem.subscriptions.seed(ending(10, now + Duration::days(3)));
        svc.remind_expiring(now).await.unwrap();

        assert_eq!(outbox.texts(), vec![lexicon::expiring_reminder("08.03.2026")]);
    }

    #[tokio::test]
    async fn empty_pool_alert_falls_back_to_admins() {
        let dir = tempfile::tempdir().unwrap();
        let (stores, _mem) = Stores::in_memory();
        let outbox = RecordingOutbox::new();
        let svc = service(stores, dir.path(), &outbox, None);

        svc.alert_pool_exhausted(77, PoolShortfall::Payment).await;

        assert_eq!(outbox.texts(), vec![lexicon::pool_exhausted_payment_alert(77); 2]);
    }

    #[tokio::test]
    async fn empty_pool_alert_for_a_trial_does_not_claim_a_payment() {
        let dir = tempfile::tempdir().unwrap();
        let (stores, _mem) = Stores::in_memory();
        let outbox = RecordingOutbox::new();
        let svc = service(stores, dir.path(), &outbox, Some(GROUP));

        svc.alert_pool_exhausted(77, PoolShortfall::Trial).await;

        assert_eq!(outbox.sent(), vec![Sent::Text { chat_id: GROUP, text: lexicon::pool_exhausted_trial_alert(77) }]);
    }

    #[tokio::test]
    async fn loop_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (stores, _mem) = Stores::in_memory();
        let outbox = RecordingOutbox::new();
        let svc = service(stores, dir.path(), &outbox, None);
        let (tx, rx) = broadcast::channel(1);

        let run = tokio::spawn(async move { svc.start(rx).await });
        tx.send(()).unwrap();

        tokio::time::timeout(StdDuration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap();
    }
}
