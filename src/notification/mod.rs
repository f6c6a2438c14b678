pub mod notification_dto;
pub mod notification_handlers;
pub mod notification_models;
pub mod notification_planner;
pub mod retry_policy;

pub use notification_models::{
    DeliveryState, NotificationPayload, NotificationType, ScheduledNotification,
};
pub use notification_planner::{NotificationPlanner, DEFAULT_REMINDER_OFFSETS};
pub use retry_policy::{DeliveryAttempt, RetryPolicy};
