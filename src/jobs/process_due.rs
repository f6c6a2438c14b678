//! Delivers notifications whose time has come.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};
use uuid::Uuid;

use super::job::{BackgroundJob, JobContext, JobKind, JobOutcome};
use crate::{
    batch_writer::BatchWriter,
    device::DeviceEndpoint,
    error::{AppError, Result},
    notification::{DeliveryAttempt, RetryPolicy, ScheduledNotification},
    store::WriteOp,
};

pub const PROCESS_DUE_BATCH_LIMIT: usize = 100;

pub struct ProcessDueJob {
    policy: RetryPolicy,
    batch_limit: usize,
}

impl ProcessDueJob {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            batch_limit: PROCESS_DUE_BATCH_LIMIT,
        }
    }

    /// Looks up every affected user's endpoints at once, each under its own timeout.
    async fn resolve_endpoints(
        &self,
        ctx: &JobContext,
        due: &[ScheduledNotification],
    ) -> HashMap<Uuid, Result<Vec<DeviceEndpoint>>> {
        let user_ids: BTreeSet<Uuid> = due.iter().map(|n| n.user_id).collect();

        let lookups = user_ids.into_iter().map(|user_id| {
            let store = ctx.store.clone();
            let timeout = ctx.lookup_timeout;
            async move {
                let lookup = store.find_active_endpoints(user_id);
                let endpoints = match tokio::time::timeout(timeout, lookup).await {
                    Ok(result) => result,
                    Err(_) => Err(AppError::Store(format!(
                        "Endpoint lookup timed out after {}ms",
                        timeout.as_millis()
                    ))),
                };
                (user_id, endpoints)
            }
        });

        join_all(lookups).await.into_iter().collect()
    }

    async fn attempt(
        &self,
        ctx: &JobContext,
        notification: &ScheduledNotification,
        endpoints: Option<&Result<Vec<DeviceEndpoint>>>,
    ) -> DeliveryAttempt {
        match endpoints {
            Some(Ok(endpoints)) if endpoints.is_empty() => DeliveryAttempt::NoEndpoints,
            Some(Ok(endpoints)) => {
                let tokens: Vec<String> = endpoints.iter().map(|e| e.token.clone()).collect();
                match ctx.dispatcher.send(&tokens, &notification.payload).await {
                    Ok(_) => DeliveryAttempt::Delivered,
                    Err(e) => DeliveryAttempt::Failed(e.to_string()),
                }
            }
            Some(Err(e)) => DeliveryAttempt::Failed(e.to_string()),
            None => DeliveryAttempt::Failed("Endpoints were not resolved".to_string()),
        }
    }
}

impl Default for ProcessDueJob {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[async_trait]
impl BackgroundJob for ProcessDueJob {
    fn kind(&self) -> JobKind {
        JobKind::ProcessDue
    }

    async fn execute(&self, ctx: &JobContext) -> Result<JobOutcome> {
        let now = ctx.clock.now();
        let due = ctx
            .store
            .find_due_notifications(now, self.batch_limit)
            .await?;
        if due.is_empty() {
            return Ok(JobOutcome::default());
        }

        let endpoints = self.resolve_endpoints(ctx, &due).await;
        let mut writer = BatchWriter::new(ctx.store.clone());
        let mut outcome = JobOutcome::default();

        for notification in &due {
            let attempt = self
                .attempt(ctx, notification, endpoints.get(&notification.user_id))
                .await;

            match &attempt {
                DeliveryAttempt::Delivered => {}
                DeliveryAttempt::NoEndpoints => {
                    outcome
                        .errors
                        .push(format!("{}: no active device tokens", notification.id));
                }
                DeliveryAttempt::Failed(reason) => {
                    warn!("Delivery of notification {} failed: {}", notification.id, reason);
                    outcome.errors.push(format!("{}: {}", notification.id, reason));
                }
            }

            let state = self.policy.next_state(notification, &attempt, now);
            writer
                .push(WriteOp::UpdateDelivery {
                    id: notification.id.clone(),
                    state,
                })
                .await?;
            outcome.count += 1;
        }

        writer.finish().await?;
        info!(
            "Processed {} due notifications ({} with errors)",
            outcome.count,
            outcome.errors.len()
        );

        Ok(outcome)
    }
}
