//! RFC-3339 UTC timestamp helpers.
//!
//! `spec.md` §6: "RFC-3339 UTC, `Z`-suffixed preferred; `+00:00` also
//! accepted on parse." Records are kept newest-first by *insertion* order,
//! not by parsed timestamp, but recursive value retrieval (§4.5) picks the
//! "most recent" record by strict maximum of parsed timestamps, with the
//! first encountered winning ties.

use chrono::{DateTime, Utc};

/// Parse an RFC-3339 timestamp, accepting both `Z` and `+00:00` suffixes.
pub fn parse(ts: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(ts).map(|dt| dt.with_timezone(&Utc))
}

/// The current instant, formatted the way this server emits timestamps:
/// `Z`-suffixed RFC-3339, second precision being the common case but not
/// enforced.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Format a [`DateTime<Utc>`] the way this server emits timestamps.
pub fn format(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_z_and_offset_suffixes() {
        let a = parse("2025-10-27T10:15:30Z").unwrap();
        let b = parse("2025-10-27T10:15:30+00:00").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("not-a-timestamp").is_err());
    }
}
