use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::{
    notification_dto::{CancelledResponse, ScheduleNotificationsRequest, ScheduledResponse},
    notification_models::NotificationStats,
};
use crate::{error::Result, state::AppState};

/// Plan reminders for a created or updated task
pub async fn schedule_notifications(
    State(state): State<AppState>,
    Json(payload): Json<ScheduleNotificationsRequest>,
) -> Result<Json<ScheduledResponse>> {
    let offsets = payload
        .offsets
        .unwrap_or_else(|| state.config.default_reminder_offsets.clone());
    let scheduled = state
        .planner
        .reschedule_for_task(&payload.task, &offsets)
        .await?;

    Ok(Json(ScheduledResponse { scheduled }))
}

/// Drop pending reminders of a deleted task
pub async fn cancel_notifications(
    State(state): State<AppState>,
    Path((user_id, task_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CancelledResponse>> {
    let cancelled = state.planner.cancel_for_task(user_id, task_id).await?;

    Ok(Json(CancelledResponse { cancelled }))
}

pub async fn get_notification_stats(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<NotificationStats>> {
    let stats = state.planner.notification_stats(user_id).await?;

    Ok(Json(stats))
}
