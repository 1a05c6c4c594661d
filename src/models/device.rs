use chrono::{DateTime, Utc};
use regex::Regex;
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::sync::LazyLock;
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_DEVICE_NAME: &str = "Browser Extension";

static CODE_SHAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z0-9]{12}$").expect("valid code regex"));

#[derive(Serialize, Debug, Clone, sqlx::FromRow)]
pub struct Device {
    pub id: Uuid,
    /// Fixed at first activation; re-activation never reassigns ownership.
    pub user_id: Uuid,
    pub device_uuid: String,
    pub name: String,
    pub browser_type: Option<String>,
    pub browser_version: Option<String>,
    pub os: Option<String>,
    pub activated_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Device row joined with its event count, as returned by the owner listing.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeviceWithEventCount {
    #[sqlx(flatten)]
    pub device: Device,
    pub watch_events_count: i64,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct ActivateDeviceRequest {
    #[validate(regex(path = *CODE_SHAPE, message = "activation codes are 12 uppercase alphanumeric characters"))]
    #[schemars(regex(pattern = r"^[A-Z0-9]{12}$"))]
    pub code: String,

    /// Client-generated stable fingerprint; distinct from the bearer token.
    #[validate(length(min = 1, max = 255))]
    pub device_uuid: String,

    #[validate(length(max = 255))]
    pub name: Option<String>,

    #[validate(length(max = 255))]
    pub browser_type: Option<String>,

    #[validate(length(max = 255))]
    pub browser_version: Option<String>,

    #[validate(length(max = 255))]
    pub os: Option<String>,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct HeartbeatRequest {
    #[validate(length(min = 1, max = 255))]
    pub device_uuid: String,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct DeviceResponse {
    pub id: Uuid,
    pub device_uuid: String,
    pub name: String,
    pub browser_type: Option<String>,
    pub browser_version: Option<String>,
    pub os: Option<String>,
    pub activated_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_events_count: Option<i64>,
}

impl From<&Device> for DeviceResponse {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id,
            device_uuid: device.device_uuid.clone(),
            name: device.name.clone(),
            browser_type: device.browser_type.clone(),
            browser_version: device.browser_version.clone(),
            os: device.os.clone(),
            activated_at: device.activated_at,
            last_seen_at: device.last_seen_at,
            is_active: device.is_active,
            created_at: device.created_at,
            watch_events_count: None,
        }
    }
}

impl From<&DeviceWithEventCount> for DeviceResponse {
    fn from(row: &DeviceWithEventCount) -> Self {
        let mut response = DeviceResponse::from(&row.device);
        response.watch_events_count = Some(row.watch_events_count);
        response
    }
}

/// Returned once from activation; the plaintext token is never shown again.
#[derive(Serialize, Debug, JsonSchema)]
pub struct ActivationResponse {
    pub device: DeviceResponse,
    pub token: String,
}

/// Heartbeat response body, keyed by `device` like the activation response.
#[derive(Serialize, Debug, JsonSchema)]
pub struct DeviceEnvelope {
    pub device: DeviceResponse,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct DeviceListResponse {
    pub devices: Vec<DeviceResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activate_request(code: &str) -> ActivateDeviceRequest {
        ActivateDeviceRequest {
            code: code.to_string(),
            device_uuid: "fp-12345".to_string(),
            name: None,
            browser_type: Some("firefox".to_string()),
            browser_version: Some("142.0".to_string()),
            os: Some("linux".to_string()),
        }
    }

    #[test]
    fn well_formed_code_passes_validation() {
        assert!(activate_request("ABCD1234WXYZ").validate().is_ok());
    }

    #[test]
    fn lowercase_code_is_rejected() {
        assert!(activate_request("abcd1234wxyz").validate().is_err());
    }

    #[test]
    fn short_code_is_rejected() {
        assert!(activate_request("ABC123").validate().is_err());
    }

    #[test]
    fn empty_fingerprint_is_rejected() {
        let mut request = activate_request("ABCD1234WXYZ");
        request.device_uuid = String::new();
        assert!(request.validate().is_err());
    }

    fn sample_device() -> Device {
        Device {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            device_uuid: "fp-1".to_string(),
            name: DEFAULT_DEVICE_NAME.to_string(),
            browser_type: None,
            browser_version: None,
            os: None,
            activated_at: None,
            last_seen_at: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn event_count_is_omitted_unless_listed() {
        let device = sample_device();

        let response = DeviceResponse::from(&device);
        assert!(response.watch_events_count.is_none());

        let listed = DeviceResponse::from(&DeviceWithEventCount {
            device,
            watch_events_count: 7,
        });
        assert_eq!(listed.watch_events_count, Some(7));
    }

    #[test]
    fn heartbeat_and_list_bodies_use_named_keys() {
        let device = sample_device();

        let heartbeat = serde_json::to_value(DeviceEnvelope {
            device: DeviceResponse::from(&device),
        })
        .expect("serialize heartbeat body");
        assert_eq!(heartbeat["device"]["device_uuid"], "fp-1");

        let listed = serde_json::to_value(DeviceListResponse {
            devices: vec![DeviceResponse::from(&device)],
        })
        .expect("serialize list body");
        assert_eq!(listed["devices"].as_array().map(Vec::len), Some(1));
    }
}
