use serde::Deserialize;
use validator::Validate;

use super::device_models::Platform;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterDeviceTokenRequest {
    #[validate(length(min = 1, max = 4096))]
    pub token: String,
    pub platform: Platform,
}
