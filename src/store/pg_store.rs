use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::{Store, WriteOp};
use crate::{
    device::DeviceEndpoint,
    error::Result,
    notification::{NotificationPayload, NotificationType, ScheduledNotification},
    task::TaskRecord,
};

const NOTIFICATION_COLUMNS: &str = "id, user_id, task_id, notification_type, scheduled_for, \
     title, body, data, icon, sent, sent_at, error, retry_count, created_at";

const TASK_COLUMNS: &str = "id, user_id, title, due_time, status";

#[derive(FromRow)]
struct NotificationRow {
    id: String,
    user_id: Uuid,
    task_id: Uuid,
    notification_type: NotificationType,
    scheduled_for: DateTime<Utc>,
    title: String,
    body: String,
    data: Json<HashMap<String, String>>,
    icon: Option<String>,
    sent: bool,
    sent_at: Option<DateTime<Utc>>,
    error: Option<String>,
    retry_count: i32,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for ScheduledNotification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            task_id: row.task_id,
            notification_type: row.notification_type,
            scheduled_for: row.scheduled_for,
            payload: NotificationPayload {
                title: row.title,
                body: row.body,
                data: row.data.0,
                icon: row.icon,
            },
            sent: row.sent,
            sent_at: row.sent_at,
            error: row.error,
            retry_count: row.retry_count,
            created_at: row.created_at,
        }
    }
}

/// Postgres-backed store. Each commit is one transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn apply_op(tx: &mut Transaction<'_, Postgres>, op: WriteOp) -> Result<()> {
    match op {
        WriteOp::SetNotification(n) => {
            sqlx::query(
                "INSERT INTO scheduled_notifications
                    (id, user_id, task_id, notification_type, scheduled_for, title, body, data,
                     icon, sent, sent_at, error, retry_count, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                 ON CONFLICT (id) DO UPDATE SET
                    notification_type = EXCLUDED.notification_type,
                    scheduled_for = EXCLUDED.scheduled_for,
                    title = EXCLUDED.title,
                    body = EXCLUDED.body,
                    data = EXCLUDED.data,
                    icon = EXCLUDED.icon,
                    sent = EXCLUDED.sent,
                    sent_at = EXCLUDED.sent_at,
                    error = EXCLUDED.error,
                    retry_count = EXCLUDED.retry_count,
                    created_at = EXCLUDED.created_at
                 WHERE scheduled_notifications.sent = false",
            )
            .bind(&n.id)
            .bind(n.user_id)
            .bind(n.task_id)
            .bind(n.notification_type)
            .bind(n.scheduled_for)
            .bind(&n.payload.title)
            .bind(&n.payload.body)
            .bind(Json(&n.payload.data))
            .bind(&n.payload.icon)
            .bind(n.sent)
            .bind(n.sent_at)
            .bind(&n.error)
            .bind(n.retry_count)
            .bind(n.created_at)
            .execute(&mut **tx)
            .await?;
        }
        WriteOp::UpdateDelivery { id, state } => {
            sqlx::query(
                "UPDATE scheduled_notifications SET
                    sent = $1, sent_at = $2, scheduled_for = $3, error = $4, retry_count = $5
                 WHERE id = $6 AND sent = false",
            )
            .bind(state.sent)
            .bind(state.sent_at)
            .bind(state.scheduled_for)
            .bind(&state.error)
            .bind(state.retry_count)
            .bind(&id)
            .execute(&mut **tx)
            .await?;
        }
        WriteOp::DeleteNotification { id } => {
            sqlx::query("DELETE FROM scheduled_notifications WHERE id = $1")
                .bind(&id)
                .execute(&mut **tx)
                .await?;
        }
        WriteOp::SetEndpoint(endpoint) => {
            sqlx::query(
                "INSERT INTO device_tokens (token, user_id, platform, created_at, last_used, is_active)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (token) DO UPDATE SET
                    user_id = EXCLUDED.user_id,
                    platform = EXCLUDED.platform,
                    last_used = EXCLUDED.last_used,
                    is_active = EXCLUDED.is_active",
            )
            .bind(&endpoint.token)
            .bind(endpoint.user_id)
            .bind(endpoint.platform)
            .bind(endpoint.created_at)
            .bind(endpoint.last_used)
            .bind(endpoint.is_active)
            .execute(&mut **tx)
            .await?;
        }
        WriteOp::DeactivateEndpoint { token } => {
            sqlx::query("UPDATE device_tokens SET is_active = false WHERE token = $1")
                .bind(&token)
                .execute(&mut **tx)
                .await?;
        }
        WriteOp::MarkTaskOverdue { task_id, updated_at } => {
            sqlx::query("UPDATE tasks SET status = 'overdue', updated_at = $1 WHERE id = $2")
                .bind(updated_at)
                .bind(task_id)
                .execute(&mut **tx)
                .await?;
        }
        WriteOp::UpdateUserStats {
            user_id,
            stats,
            last_active_at,
        } => {
            sqlx::query(
                "UPDATE users SET
                    total_tasks = $1, completed_tasks = $2, active_tasks = $3,
                    overdue_tasks = $4, last_active_at = $5
                 WHERE id = $6",
            )
            .bind(stats.total_tasks)
            .bind(stats.completed_tasks)
            .bind(stats.active_tasks)
            .bind(stats.overdue_tasks)
            .bind(last_active_at)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        }
    }

    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn find_pending_for_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> Result<Vec<ScheduledNotification>> {
        let query = format!(
            "SELECT {} FROM scheduled_notifications
             WHERE user_id = $1 AND task_id = $2 AND sent = false",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&query)
            .bind(user_id)
            .bind(task_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ScheduledNotification::from).collect())
    }

    async fn find_due_notifications(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduledNotification>> {
        let query = format!(
            "SELECT {} FROM scheduled_notifications
             WHERE sent = false AND scheduled_for <= $1
             ORDER BY scheduled_for ASC
             LIMIT $2",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&query)
            .bind(now)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ScheduledNotification::from).collect())
    }

    async fn find_sent_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduledNotification>> {
        let query = format!(
            "SELECT {} FROM scheduled_notifications
             WHERE sent = true AND sent_at <= $1
             LIMIT $2",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&query)
            .bind(cutoff)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ScheduledNotification::from).collect())
    }

    async fn find_notifications_for_user(&self, user_id: Uuid) -> Result<Vec<ScheduledNotification>> {
        let query = format!(
            "SELECT {} FROM scheduled_notifications
             WHERE user_id = $1
             ORDER BY scheduled_for DESC",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ScheduledNotification::from).collect())
    }

    async fn find_active_endpoints(&self, user_id: Uuid) -> Result<Vec<DeviceEndpoint>> {
        let endpoints = sqlx::query_as::<_, DeviceEndpoint>(
            "SELECT * FROM device_tokens WHERE user_id = $1 AND is_active = true",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(endpoints)
    }

    async fn find_endpoint(&self, token: &str) -> Result<Option<DeviceEndpoint>> {
        let endpoint = sqlx::query_as::<_, DeviceEndpoint>("SELECT * FROM device_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(endpoint)
    }

    async fn find_and_deactivate_token(&self, token: &str) -> Result<usize> {
        let result = sqlx::query(
            "UPDATE device_tokens SET is_active = false WHERE token = $1 AND is_active = true",
        )
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() as usize)
    }

    async fn find_overdue_candidates(&self, now: DateTime<Utc>) -> Result<Vec<TaskRecord>> {
        let query = format!(
            "SELECT {} FROM tasks
             WHERE status <> 'completed' AND due_time IS NOT NULL AND due_time <= $1",
            TASK_COLUMNS
        );
        let tasks = sqlx::query_as::<_, TaskRecord>(&query)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        Ok(tasks)
    }

    async fn list_user_ids(&self) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users")
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    async fn find_tasks_for_user(&self, user_id: Uuid) -> Result<Vec<TaskRecord>> {
        let query = format!("SELECT {} FROM tasks WHERE user_id = $1", TASK_COLUMNS);
        let tasks = sqlx::query_as::<_, TaskRecord>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(tasks)
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for op in ops {
            apply_op(&mut tx, op).await?;
        }
        tx.commit().await?;

        Ok(())
    }
}
