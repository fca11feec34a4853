use chrono::{DateTime, Utc};

/// Time source for classification. Window arithmetic is relative to `now`,
/// so tests substitute a fixed clock to pin decay boundaries.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
