//! Shared utilities for CLI commands.

/// Formats minutes as `Xh Ym`, or `Ym` below one hour.
///
/// Fractional minutes are rounded; negative values render as `0m`.
#[expect(
    clippy::cast_possible_truncation,
    reason = "durations are rounded to whole minutes for display"
)]
pub fn format_minutes(minutes: f64) -> String {
    let total = minutes.round().max(0.0) as i64;
    let hours = total / 60;
    let minutes = total % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Formats hours using [`format_minutes`].
pub fn format_hours(hours: f64) -> String {
    format_minutes(hours * 60.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_hours() {
        assert_eq!(format_minutes(0.0), "0m");
        assert_eq!(format_minutes(45.0), "45m");
        assert_eq!(format_minutes(60.0), "1h 0m");
        assert_eq!(format_minutes(90.4), "1h 30m");
        assert_eq!(format_hours(10.75), "10h 45m");
    }

    #[test]
    fn negative_durations_render_as_zero() {
        assert_eq!(format_minutes(-5.0), "0m");
    }
}
