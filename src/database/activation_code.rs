use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::activation_code::{ActivationCode, CODE_LENGTH};
use chrono::Duration;
use uuid::Uuid;

const ACTIVATION_CODE_FIELDS: &str = "id, user_id, code, device_id, expires_at, used_at, created_at";

/// Random 12-character candidate code. Uppercase only: codes are read off the
/// dashboard and typed into the extension popup by hand.
pub(crate) fn generate_code() -> String {
    use rand::distr::{Alphanumeric, SampleString};

    Alphanumeric.sample_string(&mut rand::rng(), CODE_LENGTH).to_ascii_uppercase()
}

#[async_trait::async_trait]
pub trait ActivationCodeRepository {
    async fn create_activation_code(&self, user_id: &Uuid, ttl_hours: i64) -> Result<ActivationCode, AppError>;
    async fn list_activation_codes(&self, user_id: &Uuid) -> Result<Vec<ActivationCode>, AppError>;
    async fn delete_activation_code(&self, user_id: &Uuid, id: &Uuid) -> Result<(), AppError>;
}

#[async_trait::async_trait]
impl ActivationCodeRepository for PostgresRepository {
    async fn create_activation_code(&self, user_id: &Uuid, ttl_hours: i64) -> Result<ActivationCode, AppError> {
        let expires_at = self.now() + Duration::hours(ttl_hours);

        // The UNIQUE constraint on `code` is the source of truth for
        // uniqueness; a conflicting insert returns no row and we draw a new
        // candidate. This holds under concurrent generation, where a
        // check-then-insert would not.
        let query = format!(
            r#"
            INSERT INTO activation_codes (user_id, code, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO NOTHING
            RETURNING {ACTIVATION_CODE_FIELDS}
            "#
        );

        loop {
            let candidate = generate_code();

            let inserted = sqlx::query_as::<_, ActivationCode>(&query)
                .bind(user_id)
                .bind(&candidate)
                .bind(expires_at)
                .bind(self.now())
                .fetch_optional(&self.pool)
                .await?;

            match inserted {
                Some(code) => return Ok(code),
                None => {
                    tracing::warn!(user_id = %user_id, "activation code collision, regenerating");
                }
            }
        }
    }

    async fn list_activation_codes(&self, user_id: &Uuid) -> Result<Vec<ActivationCode>, AppError> {
        let query = format!(
            r#"
            SELECT {ACTIVATION_CODE_FIELDS}
            FROM activation_codes
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#
        );

        let codes = sqlx::query_as::<_, ActivationCode>(&query).bind(user_id).fetch_all(&self.pool).await?;

        Ok(codes)
    }

    async fn delete_activation_code(&self, user_id: &Uuid, id: &Uuid) -> Result<(), AppError> {
        let query = format!(
            r#"
            SELECT {ACTIVATION_CODE_FIELDS}
            FROM activation_codes
            WHERE id = $1 AND user_id = $2
            "#
        );

        let code = sqlx::query_as::<_, ActivationCode>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Activation code not found".to_string()))?;

        if code.is_used() {
            return Err(AppError::BadRequest("Cannot delete a used activation code".to_string()));
        }

        // The predicate guards against a redemption racing this delete.
        let result = sqlx::query("DELETE FROM activation_codes WHERE id = $1 AND user_id = $2 AND used_at IS NULL")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::BadRequest("Cannot delete a used activation code".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::generate_code;
    use crate::models::activation_code::CODE_LENGTH;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn generated_codes_have_expected_shape() {
        for _ in 0..1000 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()), "unexpected character in {code}");
        }
    }

    #[test]
    fn generated_codes_do_not_repeat_in_practice() {
        // 62^12 candidates; any repeat in a small sample means the generator
        // is broken, not unlucky.
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(generate_code()));
        }
    }

    proptest! {
        #[test]
        fn generated_codes_are_always_well_formed(_seed in any::<u64>()) {
            let code = generate_code();
            prop_assert_eq!(code.len(), CODE_LENGTH);
            prop_assert!(code.is_ascii());
            prop_assert_eq!(code.clone(), code.to_ascii_uppercase());
        }
    }
}
