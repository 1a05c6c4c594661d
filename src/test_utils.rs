use crate::database::activation_code::ActivationCodeRepository;
use crate::database::device::DeviceRepository;
use crate::database::device_token::DeviceTokenRepository;
use crate::database::watch_event::WatchEventRepository;
use crate::error::app_error::AppError;
use crate::models::activation_code::{ActivationCode, CODE_LENGTH};
use crate::models::device::{ActivateDeviceRequest, DEFAULT_DEVICE_NAME, Device, DeviceWithEventCount};
use crate::models::pagination::PaginationParams;
use crate::models::user::TokenUser;
use crate::models::watch_event::{WatchEvent, WatchEventFilters, WatchEventPayload};
use chrono::{Duration, Utc};
use uuid::Uuid;

pub fn sample_code(user_id: Uuid) -> ActivationCode {
    let now = Utc::now();
    ActivationCode {
        id: Uuid::new_v4(),
        user_id,
        code: "A".repeat(CODE_LENGTH),
        device_id: None,
        expires_at: now + Duration::hours(24),
        used_at: None,
        created_at: now,
    }
}

impl From<&ActivateDeviceRequest> for Device {
    fn from(request: &ActivateDeviceRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            device_uuid: request.device_uuid.clone(),
            name: request.name.clone().unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string()),
            browser_type: request.browser_type.clone(),
            browser_version: request.browser_version.clone(),
            os: request.os.clone(),
            activated_at: Some(now),
            last_seen_at: Some(now),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl WatchEvent {
    pub fn from_payload(device_id: Uuid, payload: &WatchEventPayload) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            device_id,
            video_id: payload.video_id.clone(),
            video_title: payload.video_title.clone(),
            channel_name: payload.channel_name.clone(),
            channel_id: payload.channel_id.clone(),
            video_url: payload.video_url.clone(),
            duration_seconds: payload.duration_seconds,
            watch_duration_seconds: payload.watch_duration_seconds,
            watched_at: payload.watched_at.unwrap_or(now),
            thumbnail_url: payload.thumbnail_url.clone(),
            metadata: payload.metadata.clone(),
            created_at: now,
        }
    }
}

pub struct MockRepository {}

#[async_trait::async_trait]
impl ActivationCodeRepository for MockRepository {
    async fn create_activation_code(&self, user_id: &Uuid, ttl_hours: i64) -> Result<ActivationCode, AppError> {
        let mut code = sample_code(*user_id);
        code.expires_at = code.created_at + Duration::hours(ttl_hours);
        Ok(code)
    }

    async fn list_activation_codes(&self, user_id: &Uuid) -> Result<Vec<ActivationCode>, AppError> {
        Ok(vec![sample_code(*user_id)])
    }

    async fn delete_activation_code(&self, _user_id: &Uuid, _id: &Uuid) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl DeviceRepository for MockRepository {
    async fn activate_device(&self, request: &ActivateDeviceRequest) -> Result<(Device, String), AppError> {
        Ok((request.into(), "f".repeat(64)))
    }

    async fn heartbeat(&self, device_uuid: &str) -> Result<Device, AppError> {
        let request = ActivateDeviceRequest {
            code: "A".repeat(CODE_LENGTH),
            device_uuid: device_uuid.to_string(),
            name: None,
            browser_type: None,
            browser_version: None,
            os: None,
        };
        Ok((&request).into())
    }

    async fn list_devices(&self, _user_id: &Uuid) -> Result<Vec<DeviceWithEventCount>, AppError> {
        Ok(Vec::new())
    }

    async fn deactivate_device(&self, _user_id: &Uuid, _id: &Uuid) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl DeviceTokenRepository for MockRepository {
    async fn get_token_user(&self, _token_hash: &str) -> Result<Option<TokenUser>, AppError> {
        Ok(Some(TokenUser {
            id: Uuid::new_v4(),
            email: "owner@example.com".to_string(),
        }))
    }
}

#[async_trait::async_trait]
impl WatchEventRepository for MockRepository {
    async fn create_watch_event(&self, _device_uuid: &str, event: &WatchEventPayload) -> Result<WatchEvent, AppError> {
        Ok(WatchEvent::from_payload(Uuid::new_v4(), event))
    }

    async fn create_watch_events_batch(&self, _device_uuid: &str, events: &[WatchEventPayload]) -> Result<i64, AppError> {
        Ok(events.len() as i64)
    }

    async fn list_watch_events(
        &self,
        _user_id: &Uuid,
        _filters: &WatchEventFilters,
        _pagination: &PaginationParams,
    ) -> Result<(Vec<WatchEvent>, i64), AppError> {
        Ok((Vec::new(), 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rocket::async_test]
    async fn mock_activation_mints_a_token_shaped_string() {
        let repo = MockRepository {};
        let request = ActivateDeviceRequest {
            code: "A".repeat(CODE_LENGTH),
            device_uuid: "fingerprint-1".to_string(),
            name: None,
            browser_type: None,
            browser_version: None,
            os: None,
        };

        let (device, token) = repo.activate_device(&request).await.unwrap();

        assert_eq!(device.name, DEFAULT_DEVICE_NAME);
        assert!(device.is_active);
        assert_eq!(token.len(), 64);
    }

    #[rocket::async_test]
    async fn mock_batch_reports_the_number_of_events() {
        let repo = MockRepository {};
        let payload = WatchEventPayload {
            video_id: "dQw4w9WgXcQ".to_string(),
            video_title: None,
            channel_name: None,
            channel_id: None,
            video_url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
            duration_seconds: None,
            watch_duration_seconds: None,
            watched_at: None,
            thumbnail_url: None,
            metadata: None,
        };

        let count = repo.create_watch_events_batch("fingerprint-1", &[payload.clone(), payload]).await.unwrap();

        assert_eq!(count, 2);
    }
}

