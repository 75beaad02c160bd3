use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::Storage;
use crate::db::models::{DbProfile, DeliveryStats};
use crate::error::ChronikosError;
use crate::service::facts::FactService;
use crate::service::push::PushSender;
use crate::service::schedule::{due_date, parse_notification_time, parse_timezone};
use crate::types::push::{PushPayload, PushSubscription};

pub const TEST_NOTIFICATION_TITLE: &str = "Test Notification from Chronikos";

/// Counters of one scheduled dispatch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Profiles with notifications enabled and a subscription.
    pub considered: usize,
    /// Of those, the ones inside their notification window.
    pub due: usize,
    pub sent: usize,
    pub already_notified: usize,
    pub no_analysis: usize,
    pub failed: usize,
    /// Subscriptions removed because the push service rejected them.
    pub pruned: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub recipients: usize,
    pub sent: usize,
    pub failed: usize,
    pub pruned: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationStatus {
    pub date: NaiveDate,
    pub statistics: DeliveryStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserOutcome {
    Sent,
    AlreadyNotified,
    NoAnalysis,
    Failed,
    Pruned,
}

/// A profile whose notification window is open now.
struct DueUser {
    profile: DbProfile,
    subscription: PushSubscription,
    /// Local date of the notification time this run serves.
    fact_date: NaiveDate,
}

/// Scheduled and manual push notification runs.
#[derive(Clone)]
pub struct Dispatcher {
    storage: Storage,
    facts: FactService,
    push: Arc<dyn PushSender>,
    cfg: Arc<Config>,
}

impl Dispatcher {
    pub fn new(
        storage: Storage,
        facts: FactService,
        push: Arc<dyn PushSender>,
        cfg: Arc<Config>,
    ) -> Self {
        Self {
            storage,
            facts,
            push,
            cfg,
        }
    }

    /// Notify every user whose preferred local time falls in the window ending at `now`.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<DispatchReport, ChronikosError> {
        let profiles = self.storage.list_notifiable().await?;
        let mut report = DispatchReport {
            considered: profiles.len(),
            ..Default::default()
        };

        let window = self.cfg.schedule.window_minutes;
        let due: Vec<DueUser> = profiles
            .into_iter()
            .filter_map(|profile| due_user(profile, now, window))
            .collect();
        report.due = due.len();

        let outcomes: Vec<UserOutcome> = stream::iter(due)
            .map(|user| self.notify(user, now))
            .buffer_unordered(self.cfg.schedule.dispatch_concurrency.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                UserOutcome::Sent => report.sent += 1,
                UserOutcome::AlreadyNotified => report.already_notified += 1,
                UserOutcome::NoAnalysis => report.no_analysis += 1,
                UserOutcome::Failed => report.failed += 1,
                UserOutcome::Pruned => report.pruned += 1,
            }
        }

        info!(
            considered = report.considered,
            due = report.due,
            sent = report.sent,
            failed = report.failed,
            pruned = report.pruned,
            "scheduled dispatch finished"
        );
        Ok(report)
    }

    async fn notify(&self, user: DueUser, now: DateTime<Utc>) -> UserOutcome {
        let user_id = user.profile.user_id.clone();
        match self.try_notify(&user, now).await {
            Ok(outcome) => outcome,
            Err(ChronikosError::PushSubscriptionGone) => self.prune(&user_id, now).await,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "scheduled notification failed");
                UserOutcome::Failed
            }
        }
    }

    async fn try_notify(
        &self,
        user: &DueUser,
        now: DateTime<Utc>,
    ) -> Result<UserOutcome, ChronikosError> {
        let user_id = user.profile.user_id.as_str();
        let Some(fact) = self
            .facts
            .get_or_generate(&user.profile, user.fact_date, now)
            .await?
        else {
            debug!(user_id, "no interest analysis yet; skipping");
            return Ok(UserOutcome::NoAnalysis);
        };

        if self.storage.has_delivery(user_id, fact.id).await? {
            return Ok(UserOutcome::AlreadyNotified);
        }

        let payload = PushPayload::for_fact(
            fact.id,
            Some(&fact.fact_heading),
            &fact.fact_content,
            user.profile.locale(),
            &self.cfg.push.icon,
            now.timestamp_millis(),
        );
        self.push.send(&user.subscription, &payload).await?;
        self.storage.record_delivery(user_id, fact.id, now).await?;
        debug!(user_id, fact_id = fact.id, "scheduled notification sent");
        Ok(UserOutcome::Sent)
    }

    async fn prune(&self, user_id: &str, now: DateTime<Utc>) -> UserOutcome {
        match self.storage.prune_push_subscription(user_id, now).await {
            Ok(()) => {
                info!(user_id, "push subscription expired; removed");
                UserOutcome::Pruned
            }
            Err(e) => {
                warn!(user_id, error = %e, "failed to remove expired push subscription");
                UserOutcome::Failed
            }
        }
    }

    /// Send a free-text notification to every enabled subscriber.
    pub async fn broadcast(
        &self,
        title: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<BroadcastReport, ChronikosError> {
        let recipients: Vec<(String, PushSubscription)> = self
            .storage
            .list_notifiable()
            .await?
            .into_iter()
            .filter_map(|p| p.subscription().map(|s| (p.user_id, s)))
            .collect();
        let payload = PushPayload::message(title, message, &self.cfg.push.icon, now.timestamp_millis());

        let mut report = BroadcastReport {
            recipients: recipients.len(),
            ..Default::default()
        };
        let outcomes: Vec<UserOutcome> = stream::iter(recipients)
            .map(|(user_id, subscription)| {
                let payload = &payload;
                async move {
                    match self.push.send(&subscription, payload).await {
                        Ok(()) => UserOutcome::Sent,
                        Err(ChronikosError::PushSubscriptionGone) => {
                            self.prune(&user_id, now).await
                        }
                        Err(e) => {
                            warn!(user_id = %user_id, error = %e, "broadcast notification failed");
                            UserOutcome::Failed
                        }
                    }
                }
            })
            .buffer_unordered(self.cfg.schedule.dispatch_concurrency.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                UserOutcome::Sent => report.sent += 1,
                UserOutcome::Pruned => report.pruned += 1,
                _ => report.failed += 1,
            }
        }
        info!(recipients = report.recipients, sent = report.sent, "broadcast finished");
        Ok(report)
    }

    /// Subscription and delivery figures for the current UTC day.
    pub async fn status(&self, now: DateTime<Utc>) -> Result<NotificationStatus, ChronikosError> {
        let date = now.date_naive();
        let day_start = date.and_time(chrono::NaiveTime::MIN).and_utc();
        let statistics = self
            .storage
            .delivery_stats(date, day_start, day_start + Duration::days(1))
            .await?;
        Ok(NotificationStatus { date, statistics })
    }
}

fn due_user(profile: DbProfile, now: DateTime<Utc>, window: u32) -> Option<DueUser> {
    let raw_time = profile.notification_time.as_deref()?;
    let preferred = match parse_notification_time(raw_time) {
        Ok(t) => t,
        Err(e) => {
            warn!(user_id = %profile.user_id, error = %e, "skipping profile");
            return None;
        }
    };
    let tz = match parse_timezone(&profile.timezone) {
        Ok(tz) => tz,
        Err(e) => {
            warn!(user_id = %profile.user_id, error = %e, "skipping profile");
            return None;
        }
    };
    let fact_date = due_date(tz, preferred, now, window)?;
    let subscription = profile.subscription()?;
    Some(DueUser {
        profile,
        subscription,
        fact_date,
    })
}
