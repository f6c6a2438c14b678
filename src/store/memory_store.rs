use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use super::{Store, WriteOp};
use crate::{
    device::DeviceEndpoint,
    error::{AppError, Result},
    notification::ScheduledNotification,
    task::{TaskRecord, TaskStatus},
    user::UserStats,
};

#[derive(Debug, Clone, Default)]
pub struct UserRow {
    pub stats: UserStats,
    pub last_active_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    notifications: BTreeMap<String, ScheduledNotification>,
    endpoints: HashMap<String, DeviceEndpoint>,
    tasks: BTreeMap<Uuid, TaskRecord>,
    task_updated_at: HashMap<Uuid, DateTime<Utc>>,
    users: BTreeMap<Uuid, UserRow>,
    commits: Vec<usize>,
}

/// In-memory `Store` for tests. Records the size of every commit.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_commits: AtomicBool,
    fail_queries: AtomicBool,
    fail_endpoint_lookups: AtomicBool,
    slow_users: Mutex<HashMap<Uuid, Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_task(&self, task: TaskRecord) {
        let mut inner = self.inner.lock().unwrap();
        inner.users.entry(task.user_id).or_default();
        inner.tasks.insert(task.id, task);
    }

    pub fn insert_user(&self, user_id: Uuid) {
        self.inner.lock().unwrap().users.entry(user_id).or_default();
    }

    pub fn insert_notification(&self, notification: ScheduledNotification) {
        self.inner
            .lock()
            .unwrap()
            .notifications
            .insert(notification.id.clone(), notification);
    }

    pub fn insert_endpoint(&self, endpoint: DeviceEndpoint) {
        self.inner
            .lock()
            .unwrap()
            .endpoints
            .insert(endpoint.token.clone(), endpoint);
    }

    pub fn notification(&self, id: &str) -> Option<ScheduledNotification> {
        self.inner.lock().unwrap().notifications.get(id).cloned()
    }

    pub fn notifications(&self) -> Vec<ScheduledNotification> {
        self.inner.lock().unwrap().notifications.values().cloned().collect()
    }

    pub fn endpoint(&self, token: &str) -> Option<DeviceEndpoint> {
        self.inner.lock().unwrap().endpoints.get(token).cloned()
    }

    pub fn task(&self, id: Uuid) -> Option<TaskRecord> {
        self.inner.lock().unwrap().tasks.get(&id).cloned()
    }

    pub fn user(&self, id: Uuid) -> Option<UserRow> {
        self.inner.lock().unwrap().users.get(&id).cloned()
    }

    /// Operation count of every successful commit, in order.
    pub fn commit_sizes(&self) -> Vec<usize> {
        self.inner.lock().unwrap().commits.clone()
    }

    pub fn clear_commit_log(&self) {
        self.inner.lock().unwrap().commits.clear();
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn fail_endpoint_lookups(&self, fail: bool) {
        self.fail_endpoint_lookups.store(fail, Ordering::SeqCst);
    }

    /// Per-user lookups (endpoints, tasks) for `user_id` stall for `delay`.
    pub fn slow_lookups_for(&self, user_id: Uuid, delay: Duration) {
        self.slow_users.lock().unwrap().insert(user_id, delay);
    }

    async fn stall_if_slow(&self, user_id: Uuid) {
        let delay = self.slow_users.lock().unwrap().get(&user_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_queries(&self) -> Result<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(AppError::Store("query failed".into()));
        }
        Ok(())
    }
}

impl Inner {
    fn apply(&mut self, op: WriteOp) {
        match op {
            WriteOp::SetNotification(notification) => {
                let terminal = self
                    .notifications
                    .get(&notification.id)
                    .map(|existing| existing.sent)
                    .unwrap_or(false);
                if !terminal {
                    self.notifications.insert(notification.id.clone(), notification);
                }
            }
            WriteOp::UpdateDelivery { id, state } => {
                if let Some(existing) = self.notifications.get_mut(&id) {
                    if !existing.sent {
                        state.apply_to(existing);
                    }
                }
            }
            WriteOp::DeleteNotification { id } => {
                self.notifications.remove(&id);
            }
            WriteOp::SetEndpoint(endpoint) => {
                self.endpoints.insert(endpoint.token.clone(), endpoint);
            }
            WriteOp::DeactivateEndpoint { token } => {
                if let Some(endpoint) = self.endpoints.get_mut(&token) {
                    endpoint.is_active = false;
                }
            }
            WriteOp::MarkTaskOverdue { task_id, updated_at } => {
                if let Some(task) = self.tasks.get_mut(&task_id) {
                    task.status = TaskStatus::Overdue;
                    self.task_updated_at.insert(task_id, updated_at);
                }
            }
            WriteOp::UpdateUserStats {
                user_id,
                stats,
                last_active_at,
            } => {
                let row = self.users.entry(user_id).or_default();
                row.stats = stats;
                row.last_active_at = Some(last_active_at);
            }
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_pending_for_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> Result<Vec<ScheduledNotification>> {
        self.check_queries()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && n.task_id == task_id && !n.sent)
            .cloned()
            .collect())
    }

    async fn find_due_notifications(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduledNotification>> {
        self.check_queries()?;
        let inner = self.inner.lock().unwrap();
        let mut due: Vec<_> = inner
            .notifications
            .values()
            .filter(|n| n.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|n| n.scheduled_for);
        due.truncate(limit);
        Ok(due)
    }

    async fn find_sent_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduledNotification>> {
        self.check_queries()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .notifications
            .values()
            .filter(|n| n.sent && n.sent_at.map(|at| at <= cutoff).unwrap_or(false))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_notifications_for_user(&self, user_id: Uuid) -> Result<Vec<ScheduledNotification>> {
        self.check_queries()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_active_endpoints(&self, user_id: Uuid) -> Result<Vec<DeviceEndpoint>> {
        self.stall_if_slow(user_id).await;
        if self.fail_endpoint_lookups.load(Ordering::SeqCst) {
            return Err(AppError::Store("endpoint lookup failed".into()));
        }
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .endpoints
            .values()
            .filter(|e| e.user_id == user_id && e.is_active)
            .cloned()
            .collect())
    }

    async fn find_endpoint(&self, token: &str) -> Result<Option<DeviceEndpoint>> {
        self.check_queries()?;
        Ok(self.inner.lock().unwrap().endpoints.get(token).cloned())
    }

    async fn find_and_deactivate_token(&self, token: &str) -> Result<usize> {
        self.check_queries()?;
        let mut inner = self.inner.lock().unwrap();
        match inner.endpoints.get_mut(token) {
            Some(endpoint) if endpoint.is_active => {
                endpoint.is_active = false;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn find_overdue_candidates(&self, now: DateTime<Utc>) -> Result<Vec<TaskRecord>> {
        self.check_queries()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tasks
            .values()
            .filter(|t| t.status != TaskStatus::Completed)
            .filter(|t| t.due_time.map(|due| due <= now).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn list_user_ids(&self) -> Result<Vec<Uuid>> {
        self.check_queries()?;
        Ok(self.inner.lock().unwrap().users.keys().copied().collect())
    }

    async fn find_tasks_for_user(&self, user_id: Uuid) -> Result<Vec<TaskRecord>> {
        self.stall_if_slow(user_id).await;
        self.check_queries()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(AppError::Store("commit failed".into()));
        }
        let mut inner = self.inner.lock().unwrap();
        inner.commits.push(ops.len());
        for op in ops {
            inner.apply(op);
        }
        Ok(())
    }
}
