use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};
use std::time::Duration;

use iso8601_timestamp::Timestamp;

use crate::util::{from_unix_ms, unix_ms};

/// Source of the current time
///
/// Every expiry decision reads the time through this, so tests can move time
/// forward instead of sleeping.
#[derive(Clone, Default, Debug)]
pub enum Clock {
    /// Wall clock
    #[default]
    System,
    /// Manually advanced clock holding unix milliseconds
    Manual(Arc<AtomicI64>),
}

impl Clock {
    /// Create a manual clock starting at the given unix milliseconds
    pub fn manual(start_ms: i64) -> Clock {
        Clock::Manual(Arc::new(AtomicI64::new(start_ms)))
    }

    /// Current time in unix milliseconds
    pub fn now_ms(&self) -> i64 {
        match self {
            Clock::System => unix_ms(Timestamp::now_utc()),
            Clock::Manual(now) => now.load(Ordering::SeqCst),
        }
    }

    /// Current time
    pub fn now(&self) -> Timestamp {
        match self {
            Clock::System => Timestamp::now_utc(),
            Clock::Manual(now) => from_unix_ms(now.load(Ordering::SeqCst)),
        }
    }

    /// Move a manual clock forward
    pub fn advance(&self, by: Duration) {
        match self {
            Clock::System => warn!("Ignoring attempt to advance the system clock."),
            Clock::Manual(now) => {
                now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
            }
        }
    }
}
