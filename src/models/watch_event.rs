use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Serialize, Debug, Clone, sqlx::FromRow)]
pub struct WatchEvent {
    pub id: Uuid,
    pub device_id: Uuid,
    pub video_id: String,
    pub video_title: Option<String>,
    pub channel_name: Option<String>,
    pub channel_id: Option<String>,
    pub video_url: String,
    pub duration_seconds: Option<i32>,
    pub watch_duration_seconds: Option<i32>,
    pub watched_at: DateTime<Utc>,
    pub thumbnail_url: Option<String>,
    /// Client-defined blob (player state, playlist context, ...); stored as
    /// jsonb and never interpreted server-side.
    pub metadata: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

/// One telemetry event as submitted by the extension. Shared between the
/// single-event body and batch entries; `device_uuid` lives on the envelope.
#[derive(Deserialize, Serialize, Debug, Clone, Validate, JsonSchema)]
pub struct WatchEventPayload {
    #[validate(length(min = 1, max = 255))]
    pub video_id: String,

    #[validate(length(max = 255))]
    pub video_title: Option<String>,

    #[validate(length(max = 255))]
    pub channel_name: Option<String>,

    #[validate(length(max = 255))]
    pub channel_id: Option<String>,

    #[validate(url, length(max = 500))]
    pub video_url: String,

    #[validate(range(min = 0))]
    pub duration_seconds: Option<i32>,

    #[validate(range(min = 0))]
    pub watch_duration_seconds: Option<i32>,

    /// Caller-suppliable so offline batches can be back-dated; defaults to
    /// ingestion time when absent.
    pub watched_at: Option<DateTime<Utc>>,

    #[validate(url)]
    pub thumbnail_url: Option<String>,

    pub metadata: Option<JsonValue>,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct WatchEventRequest {
    #[validate(length(min = 1, max = 255))]
    pub device_uuid: String,

    #[serde(flatten)]
    #[validate(nested)]
    pub event: WatchEventPayload,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct WatchEventBatchRequest {
    #[validate(length(min = 1, max = 255))]
    pub device_uuid: String,

    #[validate(length(min = 1, max = 100), nested)]
    pub events: Vec<WatchEventPayload>,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct WatchEventResponse {
    pub id: Uuid,
    pub device_id: Uuid,
    pub video_id: String,
    pub video_title: Option<String>,
    pub channel_name: Option<String>,
    pub channel_id: Option<String>,
    pub video_url: String,
    pub duration_seconds: Option<i32>,
    pub watch_duration_seconds: Option<i32>,
    pub watched_at: DateTime<Utc>,
    pub thumbnail_url: Option<String>,
    pub metadata: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

impl From<&WatchEvent> for WatchEventResponse {
    fn from(event: &WatchEvent) -> Self {
        Self {
            id: event.id,
            device_id: event.device_id,
            video_id: event.video_id.clone(),
            video_title: event.video_title.clone(),
            channel_name: event.channel_name.clone(),
            channel_id: event.channel_id.clone(),
            video_url: event.video_url.clone(),
            duration_seconds: event.duration_seconds,
            watch_duration_seconds: event.watch_duration_seconds,
            watched_at: event.watched_at,
            thumbnail_url: event.thumbnail_url.clone(),
            metadata: event.metadata.clone(),
            created_at: event.created_at,
        }
    }
}

/// Single-event create body, keyed by `watch_event`.
#[derive(Serialize, Debug, JsonSchema)]
pub struct WatchEventEnvelope {
    pub watch_event: WatchEventResponse,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct BatchIngestResponse {
    pub count: i64,
}

/// Owner-side query filters for the watch-event listing.
#[derive(Debug, Default, Clone)]
pub struct WatchEventFilters {
    pub device_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive substring match over video title and channel name.
    pub search: Option<String>,
}
