use uuid::Uuid;

/// Owner account resolved from a bearer token.
///
/// Registration and login live in a separate service; this crate only reads
/// the `users` table to scope resources to their owner.
#[derive(Debug, sqlx::FromRow)]
pub struct TokenUser {
    pub id: Uuid,
    pub email: String,
}
