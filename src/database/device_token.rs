use crate::auth::hash_token;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::user::TokenUser;
use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

/// Generate an opaque bearer credential.
/// Returns: (plain_token, token_hash); only the hash is persisted.
pub(crate) fn generate_device_token() -> (String, String) {
    let mut token_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut token_bytes);
    let token = hex::encode(token_bytes);
    let token_hash = hash_token(&token);

    (token, token_hash)
}

/// Mint and persist a credential for a device's owner. Runs on the
/// activation transaction so a device is never left bound without a token.
///
/// Each activation mints a fresh token; tokens from earlier activations of
/// the same device stay valid. Known gap, kept for client compatibility.
pub(crate) async fn issue_device_token(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &Uuid,
    device_id: &Uuid,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let (token, token_hash) = generate_device_token();

    sqlx::query(
        r#"
        INSERT INTO device_tokens (user_id, device_id, token_hash, created_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(device_id)
    .bind(&token_hash)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(token)
}

#[async_trait::async_trait]
pub trait DeviceTokenRepository {
    async fn get_token_user(&self, token_hash: &str) -> Result<Option<TokenUser>, AppError>;
}

#[async_trait::async_trait]
impl DeviceTokenRepository for PostgresRepository {
    async fn get_token_user(&self, token_hash: &str) -> Result<Option<TokenUser>, AppError> {
        let user = sqlx::query_as::<_, TokenUser>(
            r#"
            SELECT u.id, u.email
            FROM device_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
