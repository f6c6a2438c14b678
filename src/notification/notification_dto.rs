use serde::{Deserialize, Serialize};

use crate::task::TaskRecord;

#[derive(Debug, Deserialize)]
pub struct ScheduleNotificationsRequest {
    pub task: TaskRecord,
    /// Minutes before the due time; the configured defaults apply when absent.
    pub offsets: Option<Vec<i64>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduledResponse {
    pub scheduled: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelledResponse {
    pub cancelled: usize,
}
