use crate::clock::{SharedClock, system_clock};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[derive(Clone)]
pub struct PostgresRepository {
    pub pool: PgPool,
    clock: SharedClock,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            clock: system_clock(),
        }
    }

    /// Repository with a caller-supplied clock; expiry and liveness tests
    /// move time through this instead of sleeping.
    pub fn with_clock(pool: PgPool, clock: SharedClock) -> Self {
        Self { pool, clock }
    }

    /// Every timestamp this repository writes or compares comes from here,
    /// never from `Utc::now()` or SQL `now()`.
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
