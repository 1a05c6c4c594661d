use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Source of "now" for every expiry and liveness comparison.
///
/// All validity checks (code expiry, used-at stamping, last-seen refreshes)
/// go through this trait instead of calling `Utc::now()` or SQL `now()`
/// directly, so tests can move time forward without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used everywhere outside of tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub type SharedClock = Arc<dyn Clock>;

pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}
