use crate::database::device_token::issue_device_token;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::activation_code::ActivationCode;
use crate::models::device::{ActivateDeviceRequest, DEFAULT_DEVICE_NAME, Device, DeviceWithEventCount};
use uuid::Uuid;

const DEVICE_FIELDS: &str = "id, user_id, device_uuid, name, browser_type, browser_version, os, activated_at, last_seen_at, is_active, created_at, updated_at";
const CODE_FIELDS: &str = "id, user_id, code, device_id, expires_at, used_at, created_at";

#[async_trait::async_trait]
pub trait DeviceRepository {
    /// Redeem an activation code and bind it to a device, creating or
    /// re-activating the device and minting a bearer token, all in one
    /// transaction.
    async fn activate_device(&self, request: &ActivateDeviceRequest) -> Result<(Device, String), AppError>;
    async fn heartbeat(&self, device_uuid: &str) -> Result<Device, AppError>;
    async fn list_devices(&self, user_id: &Uuid) -> Result<Vec<DeviceWithEventCount>, AppError>;
    async fn deactivate_device(&self, user_id: &Uuid, id: &Uuid) -> Result<(), AppError>;
}

#[async_trait::async_trait]
impl DeviceRepository for PostgresRepository {
    async fn activate_device(&self, request: &ActivateDeviceRequest) -> Result<(Device, String), AppError> {
        let now = self.now();
        let mut tx = self.pool.begin().await?;

        // FOR UPDATE serializes concurrent redemptions of the same code: the
        // loser blocks here until the winner commits, then sees used_at set.
        let code = sqlx::query_as::<_, ActivationCode>(&format!(
            r#"
            SELECT {CODE_FIELDS}
            FROM activation_codes
            WHERE code = $1
            FOR UPDATE
            "#
        ))
        .bind(&request.code)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::CodeNotFound)?;

        if code.is_expired(now) {
            return Err(AppError::CodeExpired);
        }
        if code.is_used() {
            return Err(AppError::CodeAlreadyUsed);
        }

        let name = request.name.clone().unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string());

        // Known fingerprints are re-activated in place. The DO UPDATE arm
        // deliberately leaves user_id, name and browser metadata untouched:
        // redeeming another account's code must not reassign ownership.
        let device = sqlx::query_as::<_, Device>(&format!(
            r#"
            INSERT INTO devices (user_id, device_uuid, name, browser_type, browser_version, os,
                                 activated_at, last_seen_at, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, TRUE, $7, $7)
            ON CONFLICT (device_uuid) DO UPDATE
            SET is_active = TRUE,
                activated_at = EXCLUDED.activated_at,
                last_seen_at = EXCLUDED.last_seen_at,
                updated_at = EXCLUDED.updated_at
            RETURNING {DEVICE_FIELDS}
            "#
        ))
        .bind(code.user_id)
        .bind(&request.device_uuid)
        .bind(&name)
        .bind(&request.browser_type)
        .bind(&request.browser_version)
        .bind(&request.os)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE activation_codes SET device_id = $1, used_at = $2 WHERE id = $3")
            .bind(device.id)
            .bind(now)
            .bind(code.id)
            .execute(&mut *tx)
            .await?;

        // Token is scoped to the device's owner, which on re-activation may
        // differ from the code's owner.
        let token = issue_device_token(&mut tx, &device.user_id, &device.id, now).await?;

        tx.commit().await?;

        Ok((device, token))
    }

    async fn heartbeat(&self, device_uuid: &str) -> Result<Device, AppError> {
        let now = self.now();

        let device = sqlx::query_as::<_, Device>(&format!(
            r#"
            UPDATE devices
            SET last_seen_at = $2, updated_at = $2
            WHERE device_uuid = $1
            RETURNING {DEVICE_FIELDS}
            "#
        ))
        .bind(device_uuid)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::DeviceNotFound)?;

        Ok(device)
    }

    async fn list_devices(&self, user_id: &Uuid) -> Result<Vec<DeviceWithEventCount>, AppError> {
        let devices = sqlx::query_as::<_, DeviceWithEventCount>(
            r#"
            SELECT d.id, d.user_id, d.device_uuid, d.name, d.browser_type, d.browser_version, d.os,
                   d.activated_at, d.last_seen_at, d.is_active, d.created_at, d.updated_at,
                   COUNT(e.id) AS watch_events_count
            FROM devices d
            LEFT JOIN watch_events e ON e.device_id = d.id
            WHERE d.user_id = $1
            GROUP BY d.id
            ORDER BY d.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(devices)
    }

    async fn deactivate_device(&self, user_id: &Uuid, id: &Uuid) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE devices SET is_active = FALSE, updated_at = $3 WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .bind(self.now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::DeviceNotFound);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test::ManualClock;
    use crate::database::activation_code::ActivationCodeRepository;
    use chrono::{Duration, Utc};
    use sqlx::PgPool;
    use std::sync::Arc;

    async fn connect() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        PgPool::connect(&url).await.expect("connect to database")
    }

    async fn create_user(pool: &PgPool) -> Uuid {
        sqlx::query_scalar("INSERT INTO users (email) VALUES ($1) RETURNING id")
            .bind(format!("{}@example.com", Uuid::new_v4()))
            .fetch_one(pool)
            .await
            .expect("insert user")
    }

    fn activation_request(code: &str) -> ActivateDeviceRequest {
        ActivateDeviceRequest {
            code: code.to_string(),
            device_uuid: Uuid::new_v4().to_string(),
            name: None,
            browser_type: Some("firefox".to_string()),
            browser_version: None,
            os: None,
        }
    }

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn activation_fails_once_the_code_expires() {
        let pool = connect().await;
        let user_id = create_user(&pool).await;

        let clock = Arc::new(ManualClock::at(Utc::now()));
        let repo = PostgresRepository::with_clock(pool, clock.clone());

        let code = repo.create_activation_code(&user_id, 1).await.expect("mint code");
        clock.advance(Duration::hours(2));

        let err = repo.activate_device(&activation_request(&code.code)).await.unwrap_err();
        assert!(matches!(err, AppError::CodeExpired));
    }

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn a_code_redeems_exactly_once() {
        let pool = connect().await;
        let user_id = create_user(&pool).await;
        let repo = PostgresRepository::new(pool);

        let code = repo.create_activation_code(&user_id, 24).await.expect("mint code");

        let (device, token) = repo.activate_device(&activation_request(&code.code)).await.expect("first redemption");
        assert_eq!(device.user_id, user_id);
        assert!(device.is_active);
        assert_eq!(token.len(), 64);

        let err = repo.activate_device(&activation_request(&code.code)).await.unwrap_err();
        assert!(matches!(err, AppError::CodeAlreadyUsed));
    }

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn concurrent_redemptions_have_exactly_one_winner() {
        let pool = connect().await;
        let user_id = create_user(&pool).await;
        let repo = PostgresRepository::new(pool.clone());
        let other_repo = PostgresRepository::new(pool);

        let code = repo.create_activation_code(&user_id, 24).await.expect("mint code");

        // Two devices race for the same code over separate connections; the
        // row lock makes the loser observe the winner's used_at.
        let first_request = activation_request(&code.code);
        let second_request = activation_request(&code.code);
        let (first, second) = tokio::join!(
            repo.activate_device(&first_request),
            other_repo.activate_device(&second_request),
        );

        let winners = [first.is_ok(), second.is_ok()].into_iter().filter(|ok| *ok).count();
        assert_eq!(winners, 1);

        let loser = if first.is_ok() { second } else { first };
        assert!(matches!(loser.unwrap_err(), AppError::CodeAlreadyUsed));
    }

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn reactivation_keeps_the_original_owner() {
        let pool = connect().await;
        let owner = create_user(&pool).await;
        let other = create_user(&pool).await;
        let repo = PostgresRepository::new(pool);

        let first = repo.create_activation_code(&owner, 24).await.expect("mint code");
        let request = activation_request(&first.code);
        let (device, _) = repo.activate_device(&request).await.expect("first activation");

        let second = repo.create_activation_code(&other, 24).await.expect("mint second code");
        let rerequest = ActivateDeviceRequest {
            device_uuid: request.device_uuid.clone(),
            ..activation_request(&second.code)
        };
        let (redevice, _) = repo.activate_device(&rerequest).await.expect("re-activation");

        assert_eq!(redevice.id, device.id);
        assert_eq!(redevice.user_id, owner);
    }
}
