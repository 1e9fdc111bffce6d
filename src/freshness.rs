use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_MAX_AGE_HOURS: i64 = 12;

/// Decides whether a stored reading can be served without re-fetching.
///
/// A reading is fresh while `now - captured_at < max_age`. Captures stamped
/// in the future (clock skew between writers) are treated as fresh.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessPolicy {
    max_age: Duration,
}

impl FreshnessPolicy {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    pub fn from_hours(hours: i64) -> Self {
        Self::new(Duration::hours(hours))
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn is_fresh(&self, captured_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(captured_at) < self.max_age
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::from_hours(DEFAULT_MAX_AGE_HOURS)
    }
}
