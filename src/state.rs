use std::sync::Arc;
use std::time::Duration;

use crate::{
    device::DeviceService,
    error::{AppError, Result},
    jobs::JobRunner,
    notification::{NotificationPlanner, DEFAULT_REMINDER_OFFSETS},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub planner: NotificationPlanner,
    pub device_service: DeviceService,
    pub job_runner: Arc<JobRunner>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub fcm_endpoint: String,
    pub fcm_server_key: String,
    pub push_timeout: Duration,
    pub store_timeout: Duration,
    pub process_due_cron: String,
    pub mark_overdue_cron: String,
    pub cleanup_sent_cron: String,
    pub recompute_stats_cron: String,
    pub default_reminder_offsets: Vec<i64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fcm_endpoint: "https://fcm.googleapis.com/fcm/send".to_string(),
            fcm_server_key: String::new(),
            push_timeout: Duration::from_secs(10),
            store_timeout: Duration::from_secs(5),
            process_due_cron: "0 * * * * *".to_string(),
            mark_overdue_cron: "0 */15 * * * *".to_string(),
            cleanup_sent_cron: "0 0 3 * * *".to_string(),
            recompute_stats_cron: "0 0 2 * * *".to_string(),
            default_reminder_offsets: DEFAULT_REMINDER_OFFSETS.to_vec(),
        }
    }
}

fn parse_secs(name: &str, value: Option<String>, default: Duration) -> Result<Duration> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| AppError::Config(format!("{} must be a number of seconds", name))),
    }
}

fn parse_offsets(value: Option<String>, default: Vec<i64>) -> Result<Vec<i64>> {
    let Some(raw) = value else {
        return Ok(default);
    };

    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .ok()
                .filter(|minutes| *minutes >= 0)
                .ok_or_else(|| {
                    AppError::Config(format!("Invalid reminder offset '{}'", part))
                })
        })
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            fcm_endpoint: lookup("FCM_ENDPOINT").unwrap_or(defaults.fcm_endpoint),
            fcm_server_key: lookup("FCM_SERVER_KEY").unwrap_or(defaults.fcm_server_key),
            push_timeout: parse_secs(
                "PUSH_TIMEOUT_SECS",
                lookup("PUSH_TIMEOUT_SECS"),
                defaults.push_timeout,
            )?,
            store_timeout: parse_secs(
                "STORE_TIMEOUT_SECS",
                lookup("STORE_TIMEOUT_SECS"),
                defaults.store_timeout,
            )?,
            process_due_cron: lookup("PROCESS_DUE_CRON").unwrap_or(defaults.process_due_cron),
            mark_overdue_cron: lookup("MARK_OVERDUE_CRON").unwrap_or(defaults.mark_overdue_cron),
            cleanup_sent_cron: lookup("CLEANUP_SENT_CRON").unwrap_or(defaults.cleanup_sent_cron),
            recompute_stats_cron: lookup("RECOMPUTE_STATS_CRON")
                .unwrap_or(defaults.recompute_stats_cron),
            default_reminder_offsets: parse_offsets(
                lookup("DEFAULT_REMINDER_OFFSETS"),
                defaults.default_reminder_offsets,
            )?,
        })
    }
}
