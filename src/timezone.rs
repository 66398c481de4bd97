//! Resolving the configured timezone to a UTC offset.

use time::{OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

/// The timezone used when none is configured.
pub const DEFAULT_TIMEZONE: &str = "Etc/UTC";

/// Get the UTC offset of `canonical_timezone` at the current instant.
///
/// Returns `None` if the name is not a known IANA timezone.
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    get_offset_at(canonical_timezone, OffsetDateTime::now_utc())
}

/// Get the UTC offset of `canonical_timezone` at `instant`.
pub fn get_offset_at(canonical_timezone: &str, instant: OffsetDateTime) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&instant).to_utc())
}

#[cfg(test)]
mod tests {
    use time::{UtcOffset, macros::datetime};

    use super::{DEFAULT_TIMEZONE, get_local_offset, get_offset_at};

    #[test]
    fn default_timezone_is_utc() {
        assert_eq!(get_local_offset(DEFAULT_TIMEZONE), Some(UtcOffset::UTC));
    }

    #[test]
    fn unknown_timezone_is_none() {
        assert_eq!(get_local_offset("Mars/Olympus_Mons"), None);
    }

    #[test]
    fn follows_daylight_saving() {
        let winter = get_offset_at("Pacific/Auckland", datetime!(2025-07-01 00:00 UTC));
        let summer = get_offset_at("Pacific/Auckland", datetime!(2025-01-01 00:00 UTC));

        assert_eq!(winter, UtcOffset::from_hms(12, 0, 0).ok());
        assert_eq!(summer, UtcOffset::from_hms(13, 0, 0).ok());
    }
}
