//! Utility functions for Sofiya
//!
//! Checked hour arithmetic and the timestamp formats used by backups and
//! user-facing notices.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Directory name format of a backup snapshot; sorts chronologically
pub const BACKUP_STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Backup directory name for `instant`
pub fn backup_stamp(instant: DateTime<Utc>) -> String {
    instant.format(BACKUP_STAMP_FORMAT).to_string()
}

/// Parse a backup directory name back into its instant
pub fn parse_backup_stamp(name: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(name, BACKUP_STAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// `from` moved by `hours`; `None` when the result leaves chrono's range
pub fn shift_hours(from: DateTime<Utc>, hours: i64) -> Option<DateTime<Utc>> {
    Duration::try_hours(hours).and_then(|delta| from.checked_add_signed(delta))
}

/// Instant `days` before `now`; the earliest representable instant when
/// that lies out of range, so nothing counts as older
pub fn retention_cutoff(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(days))
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Coarse human-readable span such as `2d 3h` or `45m`
pub fn format_remaining(span: Duration) -> String {
    let minutes = span.num_minutes().max(0);
    let (days, hours, minutes) = (minutes / 1440, (minutes % 1440) / 60, minutes % 60);

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Format a timestamp for notices, e.g. `05.01.2024 13:30`
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format("%d.%m.%Y %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_log::test;

    #[test]
    fn test_backup_stamp_round_trip() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 9, 18, 5, 7).unwrap();
        let stamp = backup_stamp(instant);

        assert_eq!(stamp, "2024-03-09_18-05-07");
        assert_eq!(parse_backup_stamp(&stamp), Some(instant));
        assert_eq!(parse_backup_stamp("latest"), None);
    }

    #[test]
    fn test_backup_stamps_sort_chronologically() {
        let earlier = backup_stamp(Utc.with_ymd_and_hms(2024, 9, 30, 23, 0, 0).unwrap());
        let later = backup_stamp(Utc.with_ymd_and_hms(2024, 10, 1, 1, 0, 0).unwrap());
        assert!(earlier < later);
    }

    #[test]
    fn test_retention_cutoff_saturates() {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        assert_eq!(retention_cutoff(now, 30), now - Duration::days(30));
        assert_eq!(retention_cutoff(now, u32::MAX), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::minutes(45)), "45m");
        assert_eq!(format_remaining(Duration::minutes(125)), "2h 5m");
        assert_eq!(format_remaining(Duration::hours(51)), "2d 3h");
        assert_eq!(format_remaining(Duration::hours(-3)), "0m");
    }

    #[test]
    fn test_shift_hours_is_checked() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(shift_hours(start, 96), Some(start + Duration::hours(96)));
        assert_eq!(shift_hours(start, -24), Some(start - Duration::hours(24)));
        assert_eq!(shift_hours(start, 10_000_000_000), None);
        assert_eq!(shift_hours(start, i64::MAX), None);
    }
}
