use chrono::{DateTime, Duration, Utc};

use super::notification_models::{DeliveryState, ScheduledNotification};

pub const MAX_DELIVERY_ATTEMPTS: i32 = 3;
pub const RETRY_DELAY_MINUTES: i64 = 5;
pub const NO_ACTIVE_ENDPOINTS: &str = "No active device tokens";

/// Result of one delivery attempt for a single notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryAttempt {
    Delivered,
    /// The user has nowhere to deliver to. Not transient, so not retried.
    NoEndpoints,
    Failed(String),
}

/// Fixed-count, fixed-delay retry with dead-lettering.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: i32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_DELIVERY_ATTEMPTS,
            retry_delay: Duration::minutes(RETRY_DELAY_MINUTES),
        }
    }
}

impl RetryPolicy {
    /// Delivery state to persist after `attempt`.
    pub fn next_state(
        &self,
        notification: &ScheduledNotification,
        attempt: &DeliveryAttempt,
        now: DateTime<Utc>,
    ) -> DeliveryState {
        match attempt {
            DeliveryAttempt::Delivered => DeliveryState {
                sent: true,
                sent_at: Some(now),
                scheduled_for: notification.scheduled_for,
                error: None,
                retry_count: notification.retry_count,
            },
            DeliveryAttempt::NoEndpoints => DeliveryState {
                sent: true,
                sent_at: Some(now),
                scheduled_for: notification.scheduled_for,
                error: Some(NO_ACTIVE_ENDPOINTS.to_string()),
                retry_count: notification.retry_count,
            },
            DeliveryAttempt::Failed(reason) => {
                let retry_count = notification.retry_count + 1;
                if retry_count < self.max_attempts {
                    DeliveryState {
                        sent: false,
                        sent_at: None,
                        scheduled_for: now + self.retry_delay,
                        error: Some(reason.clone()),
                        retry_count,
                    }
                } else {
                    DeliveryState {
                        sent: true,
                        sent_at: Some(now),
                        scheduled_for: notification.scheduled_for,
                        error: Some(format!("Failed after {} retries: {}", retry_count, reason)),
                        retry_count,
                    }
                }
            }
        }
    }
}
