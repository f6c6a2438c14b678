use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::{device_dto::RegisterDeviceTokenRequest, device_models::DeviceEndpoint};
use crate::{error::Result, state::AppState};

pub async fn register_device(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<RegisterDeviceTokenRequest>,
) -> Result<(StatusCode, Json<DeviceEndpoint>)> {
    payload.validate()?;

    let endpoint = state
        .device_service
        .register_device_token(user_id, &payload.token, payload.platform)
        .await?;

    Ok((StatusCode::CREATED, Json(endpoint)))
}

pub async fn unregister_device(
    State(state): State<AppState>,
    Path((user_id, token)): Path<(Uuid, String)>,
) -> Result<StatusCode> {
    state
        .device_service
        .unregister_device_token(user_id, &token)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
