use std::time::Duration;

use iso8601_timestamp::Timestamp;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::models::{Credential, ReentryPolicy};

/// Point in time a duration after another
pub fn later(at: Timestamp, by: Duration) -> Timestamp {
    at.saturating_add(iso8601_timestamp::Duration::milliseconds(by.as_millis() as i64))
}

/// Whether something issued at `issued_at` with the given lifetime is still live at `now`
pub fn is_live(issued_at: Timestamp, ttl: Duration, now: Timestamp) -> bool {
    now < later(issued_at, ttl)
}

/// Timestamp from unix milliseconds
pub fn from_unix_ms(ms: i64) -> Timestamp {
    Timestamp::UNIX_EPOCH.saturating_add(iso8601_timestamp::Duration::milliseconds(ms))
}

/// Unix milliseconds of a timestamp
pub fn unix_ms(at: Timestamp) -> i64 {
    at.duration_since(Timestamp::UNIX_EPOCH).whole_milliseconds() as i64
}

/// Render a number as a zero-padded code of the given width
pub fn format_code(value: u32, digits: u32) -> String {
    format!("{:0width$}", value, width = digits as usize)
}

/// Whether a string has the shape of a code of the given width
pub fn is_code(candidate: &str, digits: u32) -> bool {
    candidate.len() == digits as usize && candidate.bytes().all(|b| b.is_ascii_digit())
}

/// Tell a typed code apart from an opaque token
pub fn parse_credential(presented: &str, digits: u32) -> Credential {
    let presented = presented.trim();
    if is_code(presented, digits) {
        Credential::Code(presented.to_string())
    } else {
        Credential::Token(presented.to_string())
    }
}

/// Code as stored on the ticket, with the reentry policy letter appended
pub fn stored_code(code: &str, policy: &ReentryPolicy) -> String {
    format!("{}{}", code, policy.suffix())
}

/// Split a stored code into the visible code and its policy letter
pub fn split_stored_code(stored: &str) -> Option<(&str, char)> {
    let suffix = stored.chars().last()?;
    if !suffix.is_ascii_alphabetic() {
        return None;
    }

    Some((&stored[..stored.len() - 1], suffix))
}

/// Golden ticket draw in `[0, range)`
///
/// Seeded from the time of validation. This is a promotional lottery and
/// offers no unpredictability guarantees.
pub fn lottery_draw(seed_ms: i64, range: u32) -> u32 {
    StdRng::seed_from_u64(seed_ms as u64).gen_range(0..range.max(1))
}
