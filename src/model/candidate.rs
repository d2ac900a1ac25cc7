//! Accepted window detections.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::change_point::DualBreakEstimate;

/// Decimal places kept for regime volatilities.
const VOLATILITY_DECIMALS: i32 = 5;

/// Decimal places kept for detection confidence.
pub const CONFIDENCE_DECIMALS: i32 = 4;

/// A crisis detected in one window, before consolidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub crisis_start_date: NaiveDate,
    pub crisis_end_date: NaiveDate,
    pub volatility_pre: f64,
    pub volatility_crisis: f64,
    pub volatility_post: f64,
    /// Mean breakpoint sharpness in [0, 1].
    pub detection_confidence: f64,
    pub window_size_days: i64,
    /// Provenance: which window produced the detection.
    pub notes: String,
}

impl Candidate {
    /// Build a candidate from a dual-break estimate.
    ///
    /// `window_start` and `window_end` only feed the provenance note.
    pub fn from_estimate(
        estimate: &DualBreakEstimate,
        window_start: NaiveDate,
        window_end: NaiveDate,
        window_size_days: i64,
    ) -> Self {
        Self {
            crisis_start_date: estimate.crisis_start_date,
            crisis_end_date: estimate.crisis_end_date,
            volatility_pre: round_to(estimate.volatility_pre, VOLATILITY_DECIMALS),
            volatility_crisis: round_to(estimate.volatility_crisis, VOLATILITY_DECIMALS),
            volatility_post: round_to(estimate.volatility_post, VOLATILITY_DECIMALS),
            detection_confidence: round_to(estimate.confidence, CONFIDENCE_DECIMALS),
            window_size_days,
            notes: format!(
                "Auto-detected in window {} to {}. Vol Ratio: {:.2}x",
                window_start, window_end, estimate.volatility_ratio
            ),
        }
    }

    /// Crisis duration in days.
    pub fn duration_days(&self) -> i64 {
        (self.crisis_end_date - self.crisis_start_date).num_days()
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn estimate() -> DualBreakEstimate {
        DualBreakEstimate {
            crisis_start_date: date(2008, 9, 12),
            crisis_end_date: date(2009, 2, 27),
            tau_1: 120,
            tau_2: 240,
            volatility_pre: 0.0123456,
            volatility_crisis: 0.0456789,
            volatility_post: 0.0198765,
            confidence_start: 0.91234,
            confidence_end: 0.87654,
            confidence: 0.89444,
            volatility_ratio: 2.876543,
            observations: 250,
        }
    }

    #[test]
    fn test_from_estimate_rounds_and_notes() {
        let candidate = Candidate::from_estimate(&estimate(), date(2008, 4, 1), date(2009, 4, 1), 365);

        assert_relative_eq!(candidate.volatility_pre, 0.01235, epsilon = 1e-12);
        assert_relative_eq!(candidate.volatility_crisis, 0.04568, epsilon = 1e-12);
        assert_relative_eq!(candidate.volatility_post, 0.01988, epsilon = 1e-12);
        assert_relative_eq!(candidate.detection_confidence, 0.8944, epsilon = 1e-12);
        assert_eq!(candidate.window_size_days, 365);
        assert_eq!(
            candidate.notes,
            "Auto-detected in window 2008-04-01 to 2009-04-01. Vol Ratio: 2.88x"
        );
        assert_eq!(candidate.duration_days(), 168);
    }

    #[test]
    fn test_round_to() {
        assert_relative_eq!(round_to(0.123456, 4), 0.1235, epsilon = 1e-12);
        assert_relative_eq!(round_to(1.0, 5), 1.0);
    }
}
