use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

/// Codes are uppercase alphanumeric, no lowercase: they are read aloud or
/// typed by hand from the dashboard into the extension popup.
pub const CODE_LENGTH: usize = 12;
pub const DEFAULT_TTL_HOURS: i64 = 24;
pub const MIN_TTL_HOURS: i64 = 1;
pub const MAX_TTL_HOURS: i64 = 168;

#[derive(Serialize, Debug, Clone, sqlx::FromRow)]
pub struct ActivationCode {
    pub id: Uuid,
    pub user_id: Uuid,
    pub code: String,
    /// Set exactly once, at redemption, together with `used_at`.
    pub device_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ActivationCode {
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// A code is redeemable iff it has never been used and has not expired.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.is_used() && !self.is_expired(now)
    }
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct GenerateCodeRequest {
    /// Code lifetime in hours; defaults to 24, capped at 7 days.
    #[validate(range(min = 1, max = 168))]
    pub expires_in_hours: Option<i64>,
}

impl GenerateCodeRequest {
    pub fn ttl_hours(&self) -> i64 {
        self.expires_in_hours.unwrap_or(DEFAULT_TTL_HOURS)
    }
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct ActivationCodeResponse {
    pub id: Uuid,
    pub code: String,
    pub device_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub is_valid: bool,
    pub is_expired: bool,
    pub is_used: bool,
}

/// Create response body; the dashboard unwraps the `activation_code` key.
#[derive(Serialize, Debug, JsonSchema)]
pub struct ActivationCodeEnvelope {
    pub activation_code: ActivationCodeResponse,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct ActivationCodeListResponse {
    pub activation_codes: Vec<ActivationCodeResponse>,
}

impl ActivationCodeResponse {
    /// Derived flags are computed against the injected clock at response time,
    /// never stored.
    pub fn from_code(code: &ActivationCode, now: DateTime<Utc>) -> Self {
        Self {
            id: code.id,
            code: code.code.clone(),
            device_id: code.device_id,
            expires_at: code.expires_at,
            used_at: code.used_at,
            created_at: code.created_at,
            is_valid: code.is_valid(now),
            is_expired: code.is_expired(now),
            is_used: code.is_used(),
        }
    }
}
