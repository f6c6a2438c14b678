use serde::{Deserialize, Serialize};

use crate::task::{TaskRecord, TaskStatus};

/// Denormalised task counters stored on the user row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub active_tasks: i64,
    pub overdue_tasks: i64,
}

impl UserStats {
    pub fn from_tasks(tasks: &[TaskRecord]) -> Self {
        tasks.iter().fold(Self::default(), |mut stats, task| {
            stats.total_tasks += 1;
            if task.status.is_active() {
                stats.active_tasks += 1;
            } else if task.status == TaskStatus::Completed {
                stats.completed_tasks += 1;
            } else {
                stats.overdue_tasks += 1;
            }
            stats
        })
    }
}
