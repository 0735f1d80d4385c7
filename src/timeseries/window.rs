use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("invalid range: start ({start}) must not be after end ({end})")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("window start ({start}) must be before window end ({end})")]
    Empty {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("invalid window duration: {0:?}")]
    InvalidDuration(Duration),
}

/// A half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawWindow")]
pub struct Window {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Unchecked wire form; deserialization goes through [`Window::new`].
#[derive(Deserialize)]
struct RawWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawWindow> for Window {
    type Error = WindowError;

    fn try_from(raw: RawWindow) -> Result<Self, Self::Error> {
        Window::new(raw.start, raw.end)
    }
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        if start >= end {
            return Err(WindowError::Empty { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

pub(crate) fn to_chrono(d: Duration) -> Result<chrono::Duration, WindowError> {
    if d.is_zero() {
        return Err(WindowError::InvalidDuration(d));
    }
    chrono::Duration::from_std(d).map_err(|_| WindowError::InvalidDuration(d))
}

/// Unix timestamp of 0001-01-01T00:00:00Z, the origin window boundaries are
/// counted from.
const ZERO_TIME_UNIX_SECS: i64 = -62_135_596_800;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Rounds `t` down to a multiple of `d` counted from 0001-01-01T00:00:00Z.
///
/// Every divisor of one day lands on the same boundaries as Unix-epoch
/// rounding; longer lengths differ, e.g. 7d windows always end on a Monday.
pub fn truncate(t: DateTime<Utc>, d: Duration) -> Result<DateTime<Utc>, WindowError> {
    let step = d.as_nanos() as i128;
    if step == 0 {
        return Err(WindowError::InvalidDuration(d));
    }

    let since_origin = (t.timestamp() as i128 - ZERO_TIME_UNIX_SECS as i128) * NANOS_PER_SEC
        + t.timestamp_subsec_nanos() as i128;
    let truncated = since_origin - since_origin.rem_euclid(step);

    let secs = truncated.div_euclid(NANOS_PER_SEC) + ZERO_TIME_UNIX_SECS as i128;
    let nanos = truncated.rem_euclid(NANOS_PER_SEC) as u32;
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, nanos))
        .ok_or(WindowError::InvalidDuration(d))
}

/// The most recent fully elapsed window of length `d` at `now`.
///
/// The end is [`truncate`]`(now, d)`, so a `now` that sits exactly on a
/// boundary closes the window ending at `now`.
pub fn last_complete_window(now: DateTime<Utc>, d: Duration) -> Result<Window, WindowError> {
    let step = to_chrono(d)?;
    let end = truncate(now, d)?;
    Window::new(end - step, end)
}

/// All complete, consecutive windows of length `d` starting at `start` that
/// end at or before `end`.
pub fn windows_between(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    d: Duration,
) -> Result<Vec<Window>, WindowError> {
    if start > end {
        return Err(WindowError::InvalidRange { start, end });
    }
    let step = to_chrono(d)?;

    let mut windows = Vec::new();
    let mut current = start;
    while current + step <= end {
        let next = current + step;
        windows.push(Window::new(current, next)?);
        current = next;
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_window_rejects_empty_interval() {
        assert!(Window::new(at(1, 0), at(1, 0)).is_err());
        assert!(Window::new(at(2, 0), at(1, 0)).is_err());
        assert!(Window::new(at(1, 0), at(2, 0)).is_ok());
    }

    #[test]
    fn test_window_is_half_open() {
        let w = Window::new(at(1, 0), at(2, 0)).unwrap();
        assert!(w.contains(at(1, 0)));
        assert!(w.contains(at(1, 59)));
        assert!(!w.contains(at(2, 0)));
    }

    #[test]
    fn test_window_display() {
        let w = Window::new(at(1, 0), at(2, 0)).unwrap();
        assert_eq!(w.to_string(), "[2024-01-01T01:00:00Z, 2024-01-01T02:00:00Z)");
    }

    #[test]
    fn test_last_complete_window_aligned() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let w = last_complete_window(now, Duration::from_secs(24 * 3600)).unwrap();
        assert_eq!(w.start(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(w.end(), now);
    }

    #[test]
    fn test_last_complete_window_past_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 1, 15, 0).unwrap();
        let w = last_complete_window(now, Duration::from_secs(24 * 3600)).unwrap();
        assert_eq!(w.start(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(w.end(), Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_weekly_windows_end_on_monday() {
        let now = Utc.with_ymd_and_hms(2024, 1, 4, 12, 0, 0).unwrap();
        let w = last_complete_window(now, Duration::from_secs(7 * 24 * 3600)).unwrap();
        assert_eq!(w.start(), Utc.with_ymd_and_hms(2023, 12, 25, 0, 0, 0).unwrap());
        assert_eq!(w.end(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(w.end().weekday(), chrono::Weekday::Mon);
    }

    #[test]
    fn test_five_hour_windows_count_from_year_one() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let w = last_complete_window(now, Duration::from_secs(5 * 3600)).unwrap();
        assert_eq!(w, Window::new(at(3, 0), at(8, 0)).unwrap());
    }

    #[test]
    fn test_truncate_keeps_boundary_and_drops_subseconds() {
        let boundary = at(2, 0);
        assert_eq!(truncate(boundary, Duration::from_secs(3600)).unwrap(), boundary);

        let t = boundary + chrono::Duration::milliseconds(1500);
        assert_eq!(
            truncate(t, Duration::from_secs(1)).unwrap(),
            boundary + chrono::Duration::seconds(1)
        );
        assert!(truncate(t, Duration::ZERO).is_err());
    }

    #[test]
    fn test_deserialize_rejects_empty_window() {
        let ok: Window = serde_json::from_str(
            r#"{"start":"2024-01-01T01:00:00Z","end":"2024-01-01T02:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(ok, Window::new(at(1, 0), at(2, 0)).unwrap());

        let corrupt = serde_json::from_str::<Window>(
            r#"{"start":"2024-01-01T02:00:00Z","end":"2024-01-01T01:00:00Z"}"#,
        );
        assert!(corrupt.is_err());
    }

    #[test]
    fn test_last_complete_window_zero_duration() {
        let err = last_complete_window(at(1, 0), Duration::ZERO).unwrap_err();
        assert_eq!(err, WindowError::InvalidDuration(Duration::ZERO));
    }

    #[test]
    fn test_windows_between_end_before_start() {
        let err = windows_between(at(1, 20), at(1, 0), Duration::from_secs(3600)).unwrap_err();
        assert!(matches!(err, WindowError::InvalidRange { .. }));
    }

    #[test]
    fn test_windows_between_no_full_window() {
        let windows = windows_between(at(1, 0), at(1, 10), Duration::from_secs(3600)).unwrap();
        assert!(windows.is_empty());
    }

    #[test]
    fn test_windows_between_multiple_aligned() {
        let windows = windows_between(at(1, 0), at(1, 10), Duration::from_secs(300)).unwrap();
        assert_eq!(
            windows,
            vec![
                Window::new(at(1, 0), at(1, 5)).unwrap(),
                Window::new(at(1, 5), at(1, 10)).unwrap(),
            ]
        );
    }

    #[test]
    fn test_windows_between_partial_trailing_window_dropped() {
        let windows = windows_between(at(1, 0), at(1, 12), Duration::from_secs(600)).unwrap();
        assert_eq!(windows, vec![Window::new(at(1, 0), at(1, 10)).unwrap()]);

        let windows = windows_between(at(1, 0), at(1, 12), Duration::from_secs(300)).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].end(), at(1, 10));
    }

    #[test]
    fn test_windows_between_are_contiguous() {
        let windows = windows_between(at(0, 0), at(5, 30), Duration::from_secs(1800)).unwrap();
        assert_eq!(windows.len(), 11);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start());
        }
    }
}
