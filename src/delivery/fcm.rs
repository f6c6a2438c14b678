//! Firebase Cloud Messaging adapter using the multicast (`registration_ids`) HTTP API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::dispatcher::{PushFailure, PushProvider, TokenOutcome, DEFAULT_MULTICAST_LIMIT};
use crate::{error::Result, notification::NotificationPayload};

#[derive(Debug, Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct FcmRequest<'a> {
    registration_ids: &'a [String],
    priority: &'static str,
    notification: FcmNotification<'a>,
    data: &'a HashMap<String, String>,
}

impl<'a> FcmRequest<'a> {
    fn new(tokens: &'a [String], payload: &'a NotificationPayload) -> Self {
        Self {
            registration_ids: tokens,
            priority: "high",
            notification: FcmNotification {
                title: &payload.title,
                body: &payload.body,
                icon: payload.icon.as_deref(),
            },
            data: &payload.data,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FcmResult {
    message_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FcmResponse {
    #[serde(default)]
    results: Vec<FcmResult>,
}

fn outcome_for(result: &FcmResult) -> TokenOutcome {
    match (&result.message_id, result.error.as_deref()) {
        (_, Some("NotRegistered")) => TokenOutcome::Failed(PushFailure::NotRegistered),
        (_, Some("InvalidRegistration")) => TokenOutcome::Failed(PushFailure::InvalidToken),
        (_, Some(other)) => TokenOutcome::Failed(PushFailure::Other(other.to_string())),
        (Some(_), None) => TokenOutcome::Delivered,
        (None, None) => TokenOutcome::Failed(PushFailure::Other("Empty result".to_string())),
    }
}

pub struct FcmPushProvider {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
}

impl FcmPushProvider {
    pub fn new(client: reqwest::Client, endpoint: String, server_key: String) -> Self {
        Self {
            client,
            endpoint,
            server_key,
        }
    }
}

#[async_trait]
impl PushProvider for FcmPushProvider {
    fn max_multicast(&self) -> usize {
        DEFAULT_MULTICAST_LIMIT
    }

    async fn send_multicast(
        &self,
        tokens: &[String],
        payload: &NotificationPayload,
    ) -> Result<Vec<TokenOutcome>> {
        let response: FcmResponse = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&FcmRequest::new(tokens, payload))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.results.iter().map(outcome_for).collect())
    }
}
