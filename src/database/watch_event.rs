use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::device::Device;
use crate::models::pagination::PaginationParams;
use crate::models::watch_event::{WatchEvent, WatchEventFilters, WatchEventPayload};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, Transaction};
use uuid::Uuid;

const WATCH_EVENT_FIELDS: &str = "id, device_id, video_id, video_title, channel_name, channel_id, video_url, \
     duration_seconds, watch_duration_seconds, watched_at, thumbnail_url, metadata, created_at";

#[async_trait::async_trait]
pub trait WatchEventRepository {
    async fn create_watch_event(&self, device_uuid: &str, event: &WatchEventPayload) -> Result<WatchEvent, AppError>;
    /// All-or-nothing: either every event in the batch is persisted or none
    /// is. Callers validate the whole batch before calling.
    async fn create_watch_events_batch(&self, device_uuid: &str, events: &[WatchEventPayload]) -> Result<i64, AppError>;
    async fn list_watch_events(
        &self,
        user_id: &Uuid,
        filters: &WatchEventFilters,
        pagination: &PaginationParams,
    ) -> Result<(Vec<WatchEvent>, i64), AppError>;
}

/// Ingestion authenticates by fingerprint possession alone, so the only
/// gates are existence and the active flag.
async fn resolve_active_device(conn: &mut PgConnection, device_uuid: &str) -> Result<Device, AppError> {
    let device = sqlx::query_as::<_, Device>(
        r#"
        SELECT id, user_id, device_uuid, name, browser_type, browser_version, os,
               activated_at, last_seen_at, is_active, created_at, updated_at
        FROM devices
        WHERE device_uuid = $1
        "#,
    )
    .bind(device_uuid)
    .fetch_optional(conn)
    .await?
    .ok_or(AppError::DeviceNotFound)?;

    if !device.is_active {
        return Err(AppError::DeviceInactive);
    }

    Ok(device)
}

async fn insert_event(
    tx: &mut Transaction<'_, Postgres>,
    device_id: &Uuid,
    event: &WatchEventPayload,
    now: DateTime<Utc>,
) -> Result<WatchEvent, AppError> {
    let query = format!(
        r#"
        INSERT INTO watch_events (device_id, video_id, video_title, channel_name, channel_id, video_url,
                                  duration_seconds, watch_duration_seconds, watched_at, thumbnail_url, metadata, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING {WATCH_EVENT_FIELDS}
        "#
    );

    let inserted = sqlx::query_as::<_, WatchEvent>(&query)
        .bind(device_id)
        .bind(&event.video_id)
        .bind(&event.video_title)
        .bind(&event.channel_name)
        .bind(&event.channel_id)
        .bind(&event.video_url)
        .bind(event.duration_seconds)
        .bind(event.watch_duration_seconds)
        // Back-dated batches carry their own watched_at.
        .bind(event.watched_at.unwrap_or(now))
        .bind(&event.thumbnail_url)
        .bind(&event.metadata)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;

    Ok(inserted)
}

async fn touch_last_seen(tx: &mut Transaction<'_, Postgres>, device_id: &Uuid, now: DateTime<Utc>) -> Result<(), AppError> {
    sqlx::query("UPDATE devices SET last_seen_at = $2, updated_at = $2 WHERE id = $1")
        .bind(device_id)
        .bind(now)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

#[async_trait::async_trait]
impl WatchEventRepository for PostgresRepository {
    async fn create_watch_event(&self, device_uuid: &str, event: &WatchEventPayload) -> Result<WatchEvent, AppError> {
        let now = self.now();
        let mut tx = self.pool.begin().await?;

        let device = resolve_active_device(&mut *tx, device_uuid).await?;
        let inserted = insert_event(&mut tx, &device.id, event, now).await?;
        touch_last_seen(&mut tx, &device.id, now).await?;

        tx.commit().await?;

        Ok(inserted)
    }

    async fn create_watch_events_batch(&self, device_uuid: &str, events: &[WatchEventPayload]) -> Result<i64, AppError> {
        let now = self.now();
        let mut tx = self.pool.begin().await?;

        let device = resolve_active_device(&mut *tx, device_uuid).await?;

        let mut count: i64 = 0;
        for event in events {
            insert_event(&mut tx, &device.id, event, now).await?;
            count += 1;
        }

        // One refresh per batch, not per event.
        touch_last_seen(&mut tx, &device.id, now).await?;

        tx.commit().await?;

        Ok(count)
    }

    async fn list_watch_events(
        &self,
        user_id: &Uuid,
        filters: &WatchEventFilters,
        pagination: &PaginationParams,
    ) -> Result<(Vec<WatchEvent>, i64), AppError> {
        // Filters bind in a fixed order: user_id, device_id?, from?, to?, search?
        let mut where_clauses = vec!["d.user_id = $1".to_string()];
        let mut next_param = 2;

        if filters.device_id.is_some() {
            where_clauses.push(format!("e.device_id = ${next_param}"));
            next_param += 1;
        }
        if filters.from.is_some() {
            where_clauses.push(format!("e.watched_at >= ${next_param}"));
            next_param += 1;
        }
        if filters.to.is_some() {
            where_clauses.push(format!("e.watched_at <= ${next_param}"));
            next_param += 1;
        }
        if filters.search.is_some() {
            where_clauses.push(format!("(e.video_title ILIKE ${next_param} OR e.channel_name ILIKE ${next_param})"));
        }

        let where_clause = where_clauses.join(" AND ");
        let search_pattern = filters.search.as_ref().map(|s| format!("%{}%", escape_like(s)));

        #[derive(sqlx::FromRow)]
        struct CountRow {
            total: i64,
        }

        let count_query = format!(
            r#"
            SELECT COUNT(*) AS total
            FROM watch_events e
            JOIN devices d ON d.id = e.device_id
            WHERE {where_clause}
            "#
        );

        let mut count = sqlx::query_as::<_, CountRow>(&count_query).bind(user_id);
        if let Some(device_id) = filters.device_id {
            count = count.bind(device_id);
        }
        if let Some(from) = filters.from {
            count = count.bind(from);
        }
        if let Some(to) = filters.to {
            count = count.bind(to);
        }
        if let Some(pattern) = &search_pattern {
            count = count.bind(pattern);
        }
        let total = count.fetch_one(&self.pool).await?.total;

        let page_query = format!(
            r#"
            SELECT e.id, e.device_id, e.video_id, e.video_title, e.channel_name, e.channel_id, e.video_url,
                   e.duration_seconds, e.watch_duration_seconds, e.watched_at, e.thumbnail_url, e.metadata, e.created_at
            FROM watch_events e
            JOIN devices d ON d.id = e.device_id
            WHERE {where_clause}
            ORDER BY e.watched_at DESC, e.created_at DESC
            LIMIT {} OFFSET {}
            "#,
            pagination.effective_per_page(),
            pagination.offset(),
        );

        let mut page = sqlx::query_as::<_, WatchEvent>(&page_query).bind(user_id);
        if let Some(device_id) = filters.device_id {
            page = page.bind(device_id);
        }
        if let Some(from) = filters.from {
            page = page.bind(from);
        }
        if let Some(to) = filters.to {
            page = page.bind(to);
        }
        if let Some(pattern) = &search_pattern {
            page = page.bind(pattern);
        }
        let events = page.fetch_all(&self.pool).await?;

        Ok((events, total))
    }
}

/// Escape LIKE metacharacters so a search for "100%" matches literally.
fn escape_like(input: &str) -> String {
    input.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
