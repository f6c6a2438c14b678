mod batch_writer;
mod clock;
mod db;
mod delivery;
mod device;
mod error;
mod jobs;
mod notification;
mod routes;
mod state;
mod store;
mod task;
mod user;

use anyhow::Context;
use clock::{Clock, SystemClock};
use db::{create_pool, run_migrations};
use delivery::{DeliveryDispatcher, FcmPushProvider};
use device::DeviceService;
use jobs::{start_job_scheduler, JobContext, JobRunner};
use notification::NotificationPlanner;
use routes::create_router;
use state::{AppState, Config};
use std::sync::Arc;
use store::{PgStore, Store};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,task_notifier=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    tracing::info!("Connecting to database...");
    let db = create_pool(&database_url).await?;

    tracing::info!("Running migrations...");
    run_migrations(&db).await?;

    let store: Arc<dyn Store> = Arc::new(PgStore::new(db));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    if config.fcm_server_key.is_empty() {
        tracing::warn!("FCM_SERVER_KEY is not set, push delivery will be rejected by FCM");
    }
    let provider = Arc::new(FcmPushProvider::new(
        reqwest::Client::new(),
        config.fcm_endpoint.clone(),
        config.fcm_server_key.clone(),
    ));
    let dispatcher = Arc::new(DeliveryDispatcher::new(
        provider,
        store.clone(),
        config.push_timeout,
    ));

    let job_runner = Arc::new(JobRunner::new(JobContext {
        store: store.clone(),
        dispatcher,
        clock: clock.clone(),
        lookup_timeout: config.store_timeout,
    }));

    let state = AppState {
        config: config.clone(),
        planner: NotificationPlanner::new(store.clone(), clock.clone()),
        device_service: DeviceService::new(store, clock),
        job_runner: job_runner.clone(),
    };

    let mut scheduler = start_job_scheduler(job_runner, &config).await?;

    let app = create_router(state);

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    tracing::info!("Server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    tracing::info!("Stopping job scheduler...");
    scheduler.shutdown().await?;

    Ok(())
}
