//! Periodic batch jobs: delivery of due notifications, overdue marking,
//! cleanup of sent notifications and user statistics.

pub mod cleanup_sent;
pub mod job;
pub mod job_handlers;
pub mod mark_overdue;
pub mod process_due;
pub mod recompute_user_stats;
pub mod runner;
pub mod scheduler;

pub use job::JobContext;
pub use runner::JobRunner;
pub use scheduler::start_job_scheduler;

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;

    use crate::{
        delivery::{dispatcher::DeliveryReport, Dispatcher},
        error::{AppError, Result},
        notification::NotificationPayload,
    };

    /// For jobs that never push anything.
    pub struct NoopDispatcher;

    #[async_trait]
    impl Dispatcher for NoopDispatcher {
        async fn send(&self, _: &[String], _: &NotificationPayload) -> Result<DeliveryReport> {
            Err(AppError::Delivery("dispatch not expected".into()))
        }
    }
}
