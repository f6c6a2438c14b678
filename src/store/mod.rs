//! Persistence capability used by the planner, the dispatcher and the jobs.
//!
//! Everything that mutates state goes through [`Store::commit`] as a list of
//! [`WriteOp`]s, applied atomically. Callers never hand more than
//! [`crate::batch_writer::MAX_BATCH_OPERATIONS`] operations to one commit.

#[cfg(test)]
pub mod memory_store;
pub mod pg_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    device::DeviceEndpoint,
    error::Result,
    notification::{DeliveryState, ScheduledNotification},
    task::TaskRecord,
    user::UserStats,
};

#[cfg(test)]
pub use memory_store::MemoryStore;
pub use pg_store::PgStore;

/// A single mutation inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Upsert by deterministic id. Ignored if the stored record is already sent.
    SetNotification(ScheduledNotification),
    /// Overwrite delivery state. Ignored if the stored record is already sent.
    UpdateDelivery { id: String, state: DeliveryState },
    DeleteNotification { id: String },
    SetEndpoint(DeviceEndpoint),
    DeactivateEndpoint { token: String },
    MarkTaskOverdue { task_id: Uuid, updated_at: DateTime<Utc> },
    UpdateUserStats {
        user_id: Uuid,
        stats: UserStats,
        last_active_at: DateTime<Utc>,
    },
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Not-yet-sent notifications for one task.
    async fn find_pending_for_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> Result<Vec<ScheduledNotification>>;

    /// Unsent notifications with `scheduled_for <= now`, across all users, oldest first.
    async fn find_due_notifications(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduledNotification>>;

    /// Sent notifications with `sent_at <= cutoff`, across all users.
    async fn find_sent_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduledNotification>>;

    async fn find_notifications_for_user(&self, user_id: Uuid) -> Result<Vec<ScheduledNotification>>;

    async fn find_active_endpoints(&self, user_id: Uuid) -> Result<Vec<DeviceEndpoint>>;

    /// Looks a token up regardless of owner or active flag.
    async fn find_endpoint(&self, token: &str) -> Result<Option<DeviceEndpoint>>;

    /// Deactivates every endpoint carrying `token`, whoever owns it. Returns how many changed.
    async fn find_and_deactivate_token(&self, token: &str) -> Result<usize>;

    /// Tasks not completed whose due time is at or before `now`.
    async fn find_overdue_candidates(&self, now: DateTime<Utc>) -> Result<Vec<TaskRecord>>;

    async fn list_user_ids(&self) -> Result<Vec<Uuid>>;

    async fn find_tasks_for_user(&self, user_id: Uuid) -> Result<Vec<TaskRecord>>;

    /// Applies all operations or none.
    async fn commit(&self, ops: Vec<WriteOp>) -> Result<()>;
}
