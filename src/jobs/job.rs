use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::{clock::Clock, delivery::Dispatcher, error::Result, store::Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ProcessDue,
    MarkOverdue,
    CleanupSent,
    RecomputeUserStats,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::ProcessDue,
        JobKind::MarkOverdue,
        JobKind::CleanupSent,
        JobKind::RecomputeUserStats,
    ];
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::ProcessDue => write!(f, "process_due"),
            JobKind::MarkOverdue => write!(f, "mark_overdue"),
            JobKind::CleanupSent => write!(f, "cleanup_sent"),
            JobKind::RecomputeUserStats => write!(f, "recompute_user_stats"),
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.to_string() == s)
            .ok_or_else(|| format!("Unknown job: {}", s))
    }
}

/// What a job hands back when it ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOutcome {
    pub count: usize,
    pub errors: Vec<String>,
}

/// Machine-readable result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job: JobKind,
    pub success: bool,
    pub count: usize,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Collaborators shared by every job.
#[derive(Clone)]
pub struct JobContext {
    pub store: Arc<dyn Store>,
    pub dispatcher: Arc<dyn Dispatcher>,
    pub clock: Arc<dyn Clock>,
    /// Upper bound for a single store lookup made while processing one candidate.
    pub lookup_timeout: Duration,
}

/// A unit of periodic work.
///
/// Returning `Err` means the candidate set could not be fetched or the final
/// commit failed; the scheduler simply tries again on its next tick.
/// Failures of single candidates belong in [`JobOutcome::errors`].
#[async_trait]
pub trait BackgroundJob: Send + Sync {
    fn kind(&self) -> JobKind;

    async fn execute(&self, ctx: &JobContext) -> Result<JobOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kind_round_trips_through_names() {
        for kind in JobKind::ALL {
            assert_eq!(kind.to_string().parse::<JobKind>(), Ok(kind));
        }
        assert!("reindex".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_summary_serializes_snake_case_job() {
        let now = Utc::now();
        let summary = JobSummary {
            job: JobKind::RecomputeUserStats,
            success: true,
            count: 2,
            errors: vec![],
            started_at: now,
            finished_at: now,
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["job"], "recompute_user_stats");
        assert_eq!(json["count"], 2);
    }
}
