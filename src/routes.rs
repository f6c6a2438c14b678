use axum::{
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::{
    device::device_handlers,
    jobs::job_handlers,
    notification::notification_handlers,
    state::AppState,
};

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Service-to-service surface used by the task CRUD layer and by operators.
pub fn create_router(state: AppState) -> Router {
    let internal = Router::new()
        .route("/jobs/:job/run", post(job_handlers::run_job))
        .route(
            "/notifications/schedule",
            post(notification_handlers::schedule_notifications),
        )
        .route(
            "/users/:user_id/tasks/:task_id/notifications",
            delete(notification_handlers::cancel_notifications),
        )
        .route(
            "/users/:user_id/notification-stats",
            get(notification_handlers::get_notification_stats),
        )
        .route("/users/:user_id/devices", post(device_handlers::register_device))
        .route(
            "/users/:user_id/devices/:token",
            delete(device_handlers::unregister_device),
        );

    Router::new()
        .route("/health", get(health))
        .nest("/internal", internal)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::{Clock, ManualClock},
        device::DeviceService,
        jobs::{job::JobSummary, testing::NoopDispatcher, JobContext, JobRunner},
        notification::{notification_models::NotificationStats, NotificationPlanner},
        state::Config,
        store::MemoryStore,
        task::{TaskRecord, TaskStatus},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use chrono::{Duration, TimeZone, Utc};
    use serde::de::DeserializeOwned;
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app() -> (Arc<MemoryStore>, Arc<ManualClock>, Router) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 9, 1, 9, 0, 0).unwrap(),
        ));
        let ctx = JobContext {
            store: store.clone(),
            dispatcher: Arc::new(NoopDispatcher),
            clock: clock.clone(),
            lookup_timeout: std::time::Duration::from_secs(1),
        };
        let state = AppState {
            config: Arc::new(Config::default()),
            planner: NotificationPlanner::new(store.clone(), clock.clone()),
            device_service: DeviceService::new(store.clone(), clock.clone()),
            job_runner: Arc::new(JobRunner::new(ctx)),
        };
        (store, clock, create_router(state))
    }

    fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn read_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_store, _clock, app) = app();

        let response = app
            .oneshot(request(Method::GET, "/health", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_run_job_returns_summary() {
        let (_store, _clock, app) = app();

        let response = app
            .oneshot(request(Method::POST, "/internal/jobs/cleanup_sent/run", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let summary: JobSummary = read_json(response).await;
        assert!(summary.success);
        assert_eq!(summary.count, 0);
    }

    #[tokio::test]
    async fn test_failed_job_run_still_returns_summary() {
        let (store, _clock, app) = app();
        store.fail_queries(true);

        let response = app
            .oneshot(request(Method::POST, "/internal/jobs/mark_overdue/run", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let summary: JobSummary = read_json(response).await;
        assert!(!summary.success);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_schedule_keeps_pending_reminders() {
        let (store, clock, app) = app();
        let task = TaskRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Book flights".into(),
            due_time: Some(clock.now() + Duration::days(2)),
            status: TaskStatus::Todo,
        };

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/internal/notifications/schedule",
                Some(json!({ "task": task })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request(
                Method::POST,
                "/internal/notifications/schedule",
                Some(json!({ "task": task, "offsets": [60, -5] })),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.notifications().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_job_is_404() {
        let (_store, _clock, app) = app();

        let response = app
            .oneshot(request(Method::POST, "/internal/jobs/reindex/run", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_schedule_with_default_offsets_then_cancel() {
        let (store, clock, app) = app();
        let task = TaskRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Renew passport".into(),
            due_time: Some(clock.now() + Duration::days(2)),
            status: TaskStatus::Todo,
        };

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/internal/notifications/schedule",
                Some(json!({ "task": task })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = read_json(response).await;
        assert_eq!(body["scheduled"], 3);

        let response = app
            .clone()
            .oneshot(request(
                Method::GET,
                &format!("/internal/users/{}/notification-stats", task.user_id),
                None,
            ))
            .await
            .unwrap();
        let stats: NotificationStats = read_json(response).await;
        assert_eq!(stats.pending, 3);

        let response = app
            .oneshot(request(
                Method::DELETE,
                &format!(
                    "/internal/users/{}/tasks/{}/notifications",
                    task.user_id, task.id
                ),
                None,
            ))
            .await
            .unwrap();
        let body: Value = read_json(response).await;
        assert_eq!(body["cancelled"], 3);
        assert!(store.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_device_registration_round_trip() {
        let (store, _clock, app) = app();
        let user_id = Uuid::new_v4();

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                &format!("/internal/users/{}/devices", user_id),
                Some(json!({ "token": "fcm-token-1", "platform": "android" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(store.endpoint("fcm-token-1").unwrap().is_active);

        let response = app
            .clone()
            .oneshot(request(
                Method::DELETE,
                &format!("/internal/users/{}/devices/fcm-token-1", user_id),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(!store.endpoint("fcm-token-1").unwrap().is_active);

        let response = app
            .oneshot(request(
                Method::DELETE,
                &format!("/internal/users/{}/devices/fcm-token-1", user_id),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_device_token_is_rejected() {
        let (_store, _clock, app) = app();

        let response = app
            .oneshot(request(
                Method::POST,
                &format!("/internal/users/{}/devices", Uuid::new_v4()),
                Some(json!({ "token": "", "platform": "web" })),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
