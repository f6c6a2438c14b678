use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    DeadlineReminder,
    OverdueAlert,
    CompletionReminder,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::DeadlineReminder => write!(f, "deadline_reminder"),
            NotificationType::OverdueAlert => write!(f, "overdue_alert"),
            NotificationType::CompletionReminder => write!(f, "completion_reminder"),
        }
    }
}

/// What ends up on the device. Provider envelopes are built from this by the push adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledNotification {
    pub id: String,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub notification_type: NotificationType,
    pub scheduled_for: DateTime<Utc>,
    pub payload: NotificationPayload,
    pub sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
}

impl ScheduledNotification {
    /// Rescheduling the same task and offset must land on the same document.
    pub fn reminder_id(task_id: Uuid, offset_minutes: i64) -> String {
        format!("{}_{}", task_id, offset_minutes)
    }

    /// One alert per deadline: a re-dated task that passes its new due time alerts again.
    pub fn overdue_id(task_id: Uuid, due_time: DateTime<Utc>) -> String {
        format!("{}_overdue_{}", task_id, due_time.timestamp())
    }

    #[cfg(test)]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.sent && self.scheduled_for <= now
    }
}

/// Post-attempt delivery state written back onto a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryState {
    pub sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub scheduled_for: DateTime<Utc>,
    pub error: Option<String>,
    pub retry_count: i32,
}

impl DeliveryState {
    #[cfg(test)]
    pub fn apply_to(&self, notification: &mut ScheduledNotification) {
        notification.sent = self.sent;
        notification.sent_at = self.sent_at;
        notification.scheduled_for = self.scheduled_for;
        notification.error = self.error.clone();
        notification.retry_count = self.retry_count;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationStats {
    pub total: i64,
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
}

impl NotificationStats {
    pub fn from_notifications(notifications: &[ScheduledNotification]) -> Self {
        notifications.iter().fold(Self::default(), |mut stats, n| {
            stats.total += 1;
            if !n.sent {
                stats.pending += 1;
            } else if n.error.is_some() {
                stats.failed += 1;
            } else {
                stats.sent += 1;
            }
            stats
        })
    }
}
