use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    error::{AppError, Result},
    notification::NotificationPayload,
    store::Store,
};

/// Multicast ceiling of the common push providers.
pub const DEFAULT_MULTICAST_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushFailure {
    NotRegistered,
    InvalidToken,
    Other(String),
}

impl PushFailure {
    /// The token will never accept a message again.
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, PushFailure::NotRegistered | PushFailure::InvalidToken)
    }
}

impl std::fmt::Display for PushFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushFailure::NotRegistered => write!(f, "token not registered"),
            PushFailure::InvalidToken => write!(f, "invalid token"),
            PushFailure::Other(reason) => write!(f, "{}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOutcome {
    Delivered,
    Failed(PushFailure),
}

/// A push service able to send one payload to many tokens in one call.
#[async_trait]
pub trait PushProvider: Send + Sync {
    fn max_multicast(&self) -> usize {
        DEFAULT_MULTICAST_LIMIT
    }

    /// One outcome per token, in the order the tokens were given.
    async fn send_multicast(
        &self,
        tokens: &[String],
        payload: &NotificationPayload,
    ) -> Result<Vec<TokenOutcome>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub invalid_tokens: Vec<String>,
    pub errors: Vec<String>,
}

/// Capability the jobs use to push a payload to a user's devices.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Succeeds when at least one token received the payload.
    async fn send(&self, tokens: &[String], payload: &NotificationPayload) -> Result<DeliveryReport>;
}

pub struct DeliveryDispatcher {
    provider: Arc<dyn PushProvider>,
    store: Arc<dyn Store>,
    timeout: Duration,
}

impl DeliveryDispatcher {
    pub fn new(provider: Arc<dyn PushProvider>, store: Arc<dyn Store>, timeout: Duration) -> Self {
        Self {
            provider,
            store,
            timeout,
        }
    }

    /// Deactivates each token wherever it is registered. Failures are logged and swallowed.
    pub async fn prune_invalid_tokens(&self, tokens: &[String]) -> usize {
        let mut deactivated = 0;
        for token in tokens {
            match self.store.find_and_deactivate_token(token).await {
                Ok(count) => deactivated += count,
                Err(e) => warn!("Failed to deactivate invalid token: {}", e),
            }
        }
        if deactivated > 0 {
            info!("Deactivated {} invalid device tokens", deactivated);
        }
        deactivated
    }

    async fn send_chunk(
        &self,
        chunk: &[String],
        payload: &NotificationPayload,
        report: &mut DeliveryReport,
    ) {
        let outcomes = match tokio::time::timeout(
            self.timeout,
            self.provider.send_multicast(chunk, payload),
        )
        .await
        {
            Ok(Ok(outcomes)) => outcomes,
            Ok(Err(e)) => {
                report.failure_count += chunk.len();
                report.errors.push(e.to_string());
                return;
            }
            Err(_) => {
                report.failure_count += chunk.len();
                report.errors.push(format!(
                    "Push provider timed out after {}s",
                    self.timeout.as_secs()
                ));
                return;
            }
        };

        for (index, token) in chunk.iter().enumerate() {
            match outcomes.get(index) {
                Some(TokenOutcome::Delivered) => report.success_count += 1,
                Some(TokenOutcome::Failed(failure)) => {
                    report.failure_count += 1;
                    if failure.is_invalid_token() {
                        report.invalid_tokens.push(token.clone());
                    }
                    report.errors.push(failure.to_string());
                }
                None => {
                    report.failure_count += 1;
                    report.errors.push("No result returned for token".to_string());
                }
            }
        }
    }
}

#[async_trait]
impl Dispatcher for DeliveryDispatcher {
    async fn send(&self, tokens: &[String], payload: &NotificationPayload) -> Result<DeliveryReport> {
        if tokens.is_empty() {
            return Err(AppError::Validation("No device tokens provided".to_string()));
        }

        let mut report = DeliveryReport::default();
        for chunk in tokens.chunks(self.provider.max_multicast().max(1)) {
            self.send_chunk(chunk, payload, &mut report).await;
        }

        if !report.invalid_tokens.is_empty() {
            self.prune_invalid_tokens(&report.invalid_tokens).await;
        }

        debug!(
            "Push delivered to {}/{} tokens",
            report.success_count,
            tokens.len()
        );

        if report.success_count == 0 {
            let reason = report
                .errors
                .first()
                .cloned()
                .unwrap_or_else(|| "All tokens failed".to_string());
            return Err(AppError::Delivery(reason));
        }

        Ok(report)
    }
}
