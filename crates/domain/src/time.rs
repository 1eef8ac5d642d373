//! Timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for pairing dates and event times.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Parse an RFC 3339 timestamp as reported by the appliance, e.g. `2024-01-01T00:00:00Z`.
#[must_use]
pub fn parse_rfc3339(value: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}
