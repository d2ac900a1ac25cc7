//! Sliding window generation.
//!
//! Windows are calendar spans of `window_size_days`, advanced by
//! `step_size_days`, covering the series from its first modeling date until
//! a window would run past the last observed date.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// A single scan window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWindow {
    /// Position in scan order (0-indexed), assigned after filtering.
    pub index: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ScanWindow {
    /// Span in calendar days.
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Midpoint date, rounded down.
    pub fn center(&self) -> NaiveDate {
        self.start + Duration::days(self.span_days() / 2)
    }
}

/// Generator for sliding windows over a date range.
#[derive(Debug, Clone)]
pub struct SlidingWindows {
    window_size_days: i64,
    step_size_days: i64,
    first_date: NaiveDate,
    last_date: NaiveDate,
}

impl SlidingWindows {
    /// Create a generator. Non-positive sizes yield no windows.
    pub fn new(
        window_size_days: i64,
        step_size_days: i64,
        first_date: NaiveDate,
        last_date: NaiveDate,
    ) -> Self {
        Self {
            window_size_days,
            step_size_days,
            first_date,
            last_date,
        }
    }

    /// Generate every window that fits inside the range.
    pub fn generate(&self) -> Vec<ScanWindow> {
        let mut windows = Vec::new();
        if self.window_size_days <= 0 || self.step_size_days <= 0 {
            return windows;
        }

        let size = Duration::days(self.window_size_days);
        let step = Duration::days(self.step_size_days);
        let mut start = self.first_date;

        while start + size <= self.last_date {
            windows.push(ScanWindow {
                index: windows.len(),
                start,
                end: start + size,
            });
            start += step;
        }

        windows
    }

    /// Number of windows [`generate`](Self::generate) will produce.
    pub fn expected_windows(&self) -> usize {
        if self.window_size_days <= 0 || self.step_size_days <= 0 {
            return 0;
        }
        let available = (self.last_date - self.first_date).num_days() - self.window_size_days;
        if available < 0 {
            return 0;
        }
        (available / self.step_size_days + 1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_generation() {
        let generator = SlidingWindows::new(365, 90, date(2000, 1, 1), date(2003, 1, 1));
        let windows = generator.generate();

        assert_eq!(windows.len(), generator.expected_windows());
        assert_eq!(windows[0].start, date(2000, 1, 1));
        assert_eq!(windows[0].end, date(2000, 12, 31));
        assert!(windows.iter().all(|w| w.span_days() == 365));
        assert!(windows
            .windows(2)
            .all(|pair| (pair[1].start - pair[0].start).num_days() == 90));
        assert!(windows.last().unwrap().end <= date(2003, 1, 1));
        assert_eq!(windows[3].index, 3);
    }

    #[test]
    fn test_window_exactly_fits() {
        let generator = SlidingWindows::new(10, 5, date(2020, 1, 1), date(2020, 1, 11));
        let windows = generator.generate();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].end, date(2020, 1, 11));
    }

    #[test]
    fn test_range_shorter_than_window() {
        let generator = SlidingWindows::new(365, 90, date(2020, 1, 1), date(2020, 6, 1));
        assert!(generator.generate().is_empty());
        assert_eq!(generator.expected_windows(), 0);
    }

    #[test]
    fn test_non_positive_step() {
        let generator = SlidingWindows::new(365, 0, date(2020, 1, 1), date(2024, 1, 1));
        assert!(generator.generate().is_empty());
    }

    #[test]
    fn test_center() {
        let window = ScanWindow {
            index: 0,
            start: date(2020, 1, 1),
            end: date(2020, 12, 31),
        };
        // 365 / 2 = 182 days
        assert_eq!(window.center(), date(2020, 7, 1));
    }
}
