//! Candidate consolidation.
//!
//! Overlapping windows detect the same event several times. Candidates are
//! sorted by crisis start and clustered greedily: a candidate joins the open
//! cluster when its start lies within the tolerance of the cluster's first
//! member, otherwise the cluster is closed and a new one opened. Each cluster
//! is represented by its highest-confidence member.
//!
//! Two distinct crises starting within the tolerance of each other collapse
//! into one record.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::Candidate;

/// Canonical crisis record, one per detected event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedChangePoint {
    #[serde(flatten)]
    pub candidate: Candidate,
    /// When the record was produced.
    pub detection_date: DateTime<Utc>,
}

impl ConsolidatedChangePoint {
    pub fn new(candidate: Candidate, detection_date: DateTime<Utc>) -> Self {
        Self {
            candidate,
            detection_date,
        }
    }

    pub fn start_date(&self) -> NaiveDate {
        self.candidate.crisis_start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.candidate.crisis_end_date
    }

    pub fn confidence(&self) -> f64 {
        self.candidate.detection_confidence
    }
}

/// Consolidation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidatorConfig {
    /// Maximum distance in days between a candidate's start and its cluster anchor.
    pub tolerance_days: i64,
}

impl Default for ConsolidatorConfig {
    fn default() -> Self {
        Self { tolerance_days: 60 }
    }
}

/// Merges duplicate detections into canonical records.
#[derive(Debug, Clone, Default)]
pub struct Consolidator {
    config: ConsolidatorConfig,
}

impl Consolidator {
    pub fn new(config: ConsolidatorConfig) -> Self {
        Self { config }
    }

    /// Consolidate, stamping records with the current time.
    pub fn consolidate(&self, candidates: Vec<Candidate>) -> Vec<ConsolidatedChangePoint> {
        self.consolidate_at(candidates, Utc::now())
    }

    /// Consolidate, stamping records with `detection_date`.
    pub fn consolidate_at(
        &self,
        candidates: Vec<Candidate>,
        detection_date: DateTime<Utc>,
    ) -> Vec<ConsolidatedChangePoint> {
        let total = candidates.len();
        let consolidated: Vec<_> = self
            .representatives(candidates)
            .into_iter()
            .map(|candidate| ConsolidatedChangePoint::new(candidate, detection_date))
            .collect();

        if total > 0 {
            info!("Consolidated {} detections into {}", total, consolidated.len());
        }
        consolidated
    }

    /// Highest-confidence member of each cluster, in start-date order.
    pub fn representatives(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        // stable: equal starts keep input order
        candidates.sort_by_key(|c| c.crisis_start_date);

        let mut representatives = Vec::new();
        let mut anchor: Option<NaiveDate> = None;
        let mut best: Option<Candidate> = None;

        for candidate in candidates {
            let joins = anchor.is_some_and(|a| {
                (candidate.crisis_start_date - a).num_days().abs() <= self.config.tolerance_days
            });

            if joins {
                if let Some(current) = best.as_mut() {
                    if candidate.detection_confidence > current.detection_confidence {
                        *current = candidate;
                    }
                }
                continue;
            }

            if let Some(done) = best.take() {
                representatives.push(done);
            }
            anchor = Some(candidate.crisis_start_date);
            best = Some(candidate);
        }

        if let Some(done) = best {
            representatives.push(done);
        }
        representatives
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn candidate(start: NaiveDate, confidence: f64, notes: &str) -> Candidate {
        Candidate {
            crisis_start_date: start,
            crisis_end_date: start + chrono::Duration::days(120),
            volatility_pre: 0.01,
            volatility_crisis: 0.04,
            volatility_post: 0.015,
            detection_confidence: confidence,
            window_size_days: 365,
            notes: notes.to_string(),
        }
    }

    #[test]
    fn test_nearby_starts_merge() {
        let consolidated = Consolidator::default().representatives(vec![
            candidate(date(2008, 9, 10), 0.8, "a"),
            candidate(date(2008, 10, 5), 0.9, "b"),
        ]);
        assert_eq!(consolidated.len(), 1);
        assert_eq!(consolidated[0].notes, "b");
    }

    #[test]
    fn test_distant_starts_stay_separate() {
        let consolidated = Consolidator::default().representatives(vec![
            candidate(date(2008, 12, 1), 0.8, "b"),
            candidate(date(2008, 9, 10), 0.8, "a"),
        ]);
        assert_eq!(consolidated.len(), 2);
        assert_eq!(consolidated[0].notes, "a");
        assert_eq!(consolidated[1].notes, "b");
    }

    #[test]
    fn test_cluster_is_anchored_on_first_member() {
        // Each step is 50 days but the third is 100 days from the anchor.
        let consolidated = Consolidator::default().representatives(vec![
            candidate(date(2020, 1, 1), 0.7, "a"),
            candidate(date(2020, 2, 20), 0.75, "b"),
            candidate(date(2020, 4, 10), 0.95, "c"),
        ]);
        assert_eq!(consolidated.len(), 2);
        assert_eq!(consolidated[0].notes, "b");
        assert_eq!(consolidated[1].notes, "c");
    }

    #[test]
    fn test_confidence_tie_keeps_first() {
        let consolidated = Consolidator::default().representatives(vec![
            candidate(date(2020, 1, 1), 0.8, "first"),
            candidate(date(2020, 1, 20), 0.8, "second"),
        ]);
        assert_eq!(consolidated[0].notes, "first");
    }

    #[test]
    fn test_tolerance_boundary() {
        let consolidated = Consolidator::default().representatives(vec![
            candidate(date(2020, 1, 1), 0.8, "a"),
            candidate(date(2020, 3, 1), 0.9, "b"),
        ]);
        // exactly 60 days
        assert_eq!(consolidated.len(), 1);

        let consolidated = Consolidator::default().representatives(vec![
            candidate(date(2020, 1, 1), 0.8, "a"),
            candidate(date(2020, 3, 2), 0.9, "b"),
        ]);
        assert_eq!(consolidated.len(), 2);
    }

    #[test]
    fn test_consolidate_at_stamps_records() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let consolidated = Consolidator::default()
            .consolidate_at(vec![candidate(date(2020, 1, 1), 0.8, "a")], at);
        assert_eq!(consolidated[0].detection_date, at);
        assert_eq!(consolidated[0].start_date(), date(2020, 1, 1));

        assert!(Consolidator::default().consolidate_at(vec![], at).is_empty());
    }

    #[test]
    fn test_serializes_flat() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let record = ConsolidatedChangePoint::new(candidate(date(2020, 1, 1), 0.8, "a"), at);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["crisis_start_date"], "2020-01-01");
        assert!(json.get("detection_date").is_some());
        assert!(json.get("candidate").is_none());
    }
}
