//! Scoring of detections against curated historical events.
//!
//! An event counts as detected when it falls inside a crisis, or within the
//! tolerance of a crisis start on either side. A crisis counts as a false
//! positive when no event lies within the tolerance of its start.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::consolidation::ConsolidatedChangePoint;
use crate::data::GroundTruthEvent;

/// Validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Maximum distance in days between an event and a crisis start.
    pub tolerance_days: i64,
    /// Matches and misses included in the log.
    pub max_logged: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            tolerance_days: 60,
            max_logged: 5,
        }
    }
}

/// Whether both inputs were available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Completed,
    NoDetections,
    NoGroundTruth,
}

/// An event and the crisis that detected it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMatch {
    pub event: GroundTruthEvent,
    pub detected_start: NaiveDate,
    pub detected_end: NaiveDate,
    pub confidence: f64,
}

/// A crisis with no nearby event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FalsePositive {
    pub detected_start: NaiveDate,
    pub detected_end: NaiveDate,
    pub confidence: f64,
}

/// Detection quality against ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub total_known_events: usize,
    pub detected_events: usize,
    pub missed_events: usize,
    pub false_positives: usize,
    /// Percent of events detected.
    pub detection_rate: f64,
    /// Percent of crises without a nearby event.
    pub false_positive_rate: f64,
    pub matches: Vec<EventMatch>,
    pub missed: Vec<GroundTruthEvent>,
    pub false_positive_crises: Vec<FalsePositive>,
}

impl ValidationResult {
    pub fn summary(&self) -> String {
        format!(
            "Validation ({:?}): {}/{} events detected ({:.1}%), {} false positives ({:.1}%)",
            self.status,
            self.detected_events,
            self.total_known_events,
            self.detection_rate,
            self.false_positives,
            self.false_positive_rate
        )
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Scores crisis records against ground-truth events.
#[derive(Debug, Clone, Default)]
pub struct GroundTruthValidator {
    config: ValidationConfig,
}

impl GroundTruthValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    fn near_start(&self, event_date: NaiveDate, crisis: &ConsolidatedChangePoint) -> bool {
        (event_date - crisis.start_date()).num_days().abs() <= self.config.tolerance_days
    }

    /// First crisis, in the given order, that detects the event.
    fn matching_crisis<'a>(
        &self,
        event: &GroundTruthEvent,
        crises: &'a [ConsolidatedChangePoint],
    ) -> Option<&'a ConsolidatedChangePoint> {
        crises.iter().find(|c| {
            let inside = c.start_date() <= event.event_date && event.event_date <= c.end_date();
            inside || self.near_start(event.event_date, c)
        })
    }

    pub fn validate(
        &self,
        crises: &[ConsolidatedChangePoint],
        events: &[GroundTruthEvent],
    ) -> ValidationResult {
        let status = if crises.is_empty() {
            ValidationStatus::NoDetections
        } else if events.is_empty() {
            ValidationStatus::NoGroundTruth
        } else {
            ValidationStatus::Completed
        };

        let mut matches = Vec::new();
        let mut missed = Vec::new();
        for event in events {
            match self.matching_crisis(event, crises) {
                Some(crisis) => matches.push(EventMatch {
                    event: event.clone(),
                    detected_start: crisis.start_date(),
                    detected_end: crisis.end_date(),
                    confidence: crisis.confidence(),
                }),
                None => missed.push(event.clone()),
            }
        }

        let false_positive_crises: Vec<FalsePositive> = crises
            .iter()
            .filter(|c| !events.iter().any(|e| self.near_start(e.event_date, c)))
            .map(|c| FalsePositive {
                detected_start: c.start_date(),
                detected_end: c.end_date(),
                confidence: c.confidence(),
            })
            .collect();

        let result = ValidationResult {
            status,
            total_known_events: events.len(),
            detected_events: matches.len(),
            missed_events: missed.len(),
            false_positives: false_positive_crises.len(),
            detection_rate: percent(matches.len(), events.len()),
            false_positive_rate: percent(false_positive_crises.len(), crises.len()),
            matches,
            missed,
            false_positive_crises,
        };
        self.log(&result);
        result
    }

    fn log(&self, result: &ValidationResult) {
        match result.status {
            ValidationStatus::NoDetections => warn!("No detections to validate"),
            ValidationStatus::NoGroundTruth => warn!("No ground truth events available for validation"),
            ValidationStatus::Completed => {}
        }

        info!("{}", result.summary());
        if !result.matches.is_empty() {
            info!("Matched events:");
            for m in result.matches.iter().take(self.config.max_logged) {
                info!(
                    "  {} ({}) -> crisis {} to {}",
                    m.event.description, m.event.event_date, m.detected_start, m.detected_end
                );
            }
        }
        if !result.missed.is_empty() {
            info!("Missed events:");
            for e in result.missed.iter().take(self.config.max_logged) {
                info!("  {} ({})", e.description, e.event_date);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Candidate;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn crisis(start: NaiveDate, end: NaiveDate) -> ConsolidatedChangePoint {
        ConsolidatedChangePoint::new(
            Candidate {
                crisis_start_date: start,
                crisis_end_date: end,
                volatility_pre: 0.01,
                volatility_crisis: 0.04,
                volatility_post: 0.02,
                detection_confidence: 0.88,
                window_size_days: 365,
                notes: String::new(),
            },
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_event_before_start_within_tolerance() {
        let start = date(2008, 9, 1);
        let crises = vec![crisis(start, date(2009, 3, 1))];
        let events = vec![
            GroundTruthEvent::new(start - Duration::days(45), "near"),
            GroundTruthEvent::new(start - Duration::days(90), "far"),
        ];

        let result = GroundTruthValidator::default().validate(&crises, &events);
        assert_eq!(result.status, ValidationStatus::Completed);
        assert_eq!(result.detected_events, 1);
        assert_eq!(result.matches[0].event.description, "near");
        assert_eq!(result.missed[0].description, "far");
        assert_relative_eq!(result.detection_rate, 50.0);
        assert_eq!(result.false_positives, 0);
    }

    #[test]
    fn test_event_inside_crisis_but_far_from_start() {
        let crises = vec![crisis(date(2008, 9, 1), date(2009, 6, 1))];
        let events = vec![GroundTruthEvent::new(date(2009, 3, 1), "late")];

        let result = GroundTruthValidator::default().validate(&crises, &events);
        assert_eq!(result.detected_events, 1);
        // Matched by containment only, so the crisis is still a false positive.
        assert_eq!(result.false_positives, 1);
        assert_relative_eq!(result.false_positive_rate, 100.0);
    }

    #[test]
    fn test_first_matching_crisis_wins() {
        let crises = vec![
            crisis(date(2020, 1, 1), date(2020, 6, 1)),
            crisis(date(2020, 2, 1), date(2020, 4, 1)),
        ];
        let events = vec![GroundTruthEvent::new(date(2020, 2, 15), "covid")];
        let result = GroundTruthValidator::default().validate(&crises, &events);
        assert_eq!(result.matches[0].detected_start, date(2020, 1, 1));
    }

    #[test]
    fn test_status_flags() {
        let events = vec![GroundTruthEvent::new(date(2020, 3, 1), "covid")];
        let result = GroundTruthValidator::default().validate(&[], &events);
        assert_eq!(result.status, ValidationStatus::NoDetections);
        assert_eq!(result.missed_events, 1);
        assert_relative_eq!(result.false_positive_rate, 0.0);

        let crises = vec![crisis(date(2020, 2, 20), date(2020, 5, 1))];
        let result = GroundTruthValidator::default().validate(&crises, &[]);
        assert_eq!(result.status, ValidationStatus::NoGroundTruth);
        assert_relative_eq!(result.detection_rate, 0.0);
        assert_eq!(result.false_positives, 1);
    }
}
