use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::device_models::{DeviceEndpoint, Platform};
use crate::{
    batch_writer::BatchWriter,
    clock::Clock,
    error::{AppError, Result},
    store::{Store, WriteOp},
};

/// Registration and soft-removal of push endpoints.
#[derive(Clone)]
pub struct DeviceService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl DeviceService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Creates the endpoint, or refreshes it (and takes it over) if the token is already active.
    /// A deactivated token is never brought back.
    pub async fn register_device_token(
        &self,
        user_id: Uuid,
        token: &str,
        platform: Platform,
    ) -> Result<DeviceEndpoint> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::Validation("Device token must not be empty".to_string()));
        }

        let now = self.clock.now();
        let endpoint = match self.store.find_endpoint(token).await? {
            Some(existing) if !existing.is_active => {
                return Err(AppError::Validation(
                    "Device token has been revoked".to_string(),
                ));
            }
            Some(existing) => DeviceEndpoint {
                user_id,
                platform,
                last_used: now,
                ..existing
            },
            None => DeviceEndpoint {
                token: token.to_string(),
                user_id,
                platform,
                created_at: now,
                last_used: now,
                is_active: true,
            },
        };

        let mut writer = BatchWriter::new(self.store.clone());
        writer.push(WriteOp::SetEndpoint(endpoint.clone())).await?;
        writer.finish().await?;
        info!("Registered {} device token for user {}", platform, user_id);

        Ok(endpoint)
    }

    pub async fn unregister_device_token(&self, user_id: Uuid, token: &str) -> Result<()> {
        let owned = self
            .store
            .find_endpoint(token)
            .await?
            .filter(|endpoint| endpoint.user_id == user_id && endpoint.is_active);
        if owned.is_none() {
            return Err(AppError::NotFound("Device token not found".to_string()));
        }

        let mut writer = BatchWriter::new(self.store.clone());
        writer
            .push(WriteOp::DeactivateEndpoint {
                token: token.to_string(),
            })
            .await?;
        writer.finish().await?;
        info!("Unregistered device token for user {}", user_id);

        Ok(())
    }
}
