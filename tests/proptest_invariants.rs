use chrono::{Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

use crisis_detector::consolidation::{Consolidator, ConsolidatorConfig};
use crisis_detector::model::{breakpoint_confidence, centered_bounds, Candidate};
use crisis_detector::scanner::SlidingWindows;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()
}

fn candidate(offset: i64, confidence: f64) -> Candidate {
    let start = base_date() + Duration::days(offset);
    Candidate {
        crisis_start_date: start,
        crisis_end_date: start + Duration::days(120),
        volatility_pre: 0.01,
        volatility_crisis: 0.03,
        volatility_post: 0.015,
        detection_confidence: confidence,
        window_size_days: 365,
        notes: String::new(),
    }
}

/// Clusters by the anchored 60-day rule, in start order.
fn clusters(candidates: &[Candidate], tolerance_days: i64) -> Vec<Vec<Candidate>> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by_key(|c| c.crisis_start_date);

    let mut clusters: Vec<Vec<Candidate>> = Vec::new();
    for candidate in sorted {
        match clusters.last_mut() {
            Some(cluster)
                if (candidate.crisis_start_date - cluster[0].crisis_start_date)
                    .num_days()
                    .abs()
                    <= tolerance_days =>
            {
                cluster.push(candidate)
            }
            _ => clusters.push(vec![candidate]),
        }
    }
    clusters
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    #[test]
    fn windows_have_fixed_span_and_step(
        window in 30i64..800,
        step_fraction in 0.01f64..0.99,
        range_days in 0i64..6000,
    ) {
        let step = ((window as f64 * step_fraction) as i64).max(1);
        let first = base_date();
        let last = first + Duration::days(range_days);
        let generator = SlidingWindows::new(window, step, first, last);
        let windows = generator.generate();

        prop_assert_eq!(windows.len(), generator.expected_windows());
        for (i, w) in windows.iter().enumerate() {
            prop_assert_eq!(w.index, i);
            prop_assert_eq!(w.span_days(), window);
            prop_assert!(w.end <= last);
            let (start, end) = centered_bounds(w.center(), window);
            prop_assert_eq!(start, w.start);
            prop_assert_eq!(end, w.end);
        }
        for pair in windows.windows(2) {
            prop_assert_eq!((pair[1].start - pair[0].start).num_days(), step);
        }
        if let Some(tail) = windows.last() {
            prop_assert!(tail.start + Duration::days(step + window) > last);
        }
    }

    #[test]
    fn consolidation_keeps_best_detection(
        raw in prop::collection::vec((0i64..3000, 0.0f64..1.0), 0..40),
    ) {
        let candidates: Vec<Candidate> =
            raw.iter().map(|&(offset, conf)| candidate(offset, conf)).collect();
        let kept = Consolidator::default().representatives(candidates.clone());

        prop_assert!(kept.len() <= candidates.len());
        prop_assert_eq!(kept.is_empty(), candidates.is_empty());
        prop_assert!(kept.iter().all(|k| candidates.contains(k)));
        prop_assert!(kept
            .windows(2)
            .all(|p| p[0].crisis_start_date <= p[1].crisis_start_date));

        let groups = clusters(&candidates, 60);
        prop_assert_eq!(kept.len(), groups.len());
        for (representative, members) in kept.iter().zip(&groups) {
            let best = members
                .iter()
                .fold(&members[0], |best, c| {
                    if c.detection_confidence > best.detection_confidence { c } else { best }
                });
            prop_assert_eq!(representative, best);
            prop_assert!(members
                .iter()
                .all(|m| m.detection_confidence <= representative.detection_confidence));
        }
    }

    #[test]
    fn consolidation_is_idempotent_on_spaced_detections(
        gaps in prop::collection::vec(61i64..400, 1..20),
        confidences in prop::collection::vec(0.0f64..1.0, 20),
    ) {
        let mut offset = 0;
        let candidates: Vec<Candidate> = gaps
            .iter()
            .zip(&confidences)
            .map(|(gap, &conf)| {
                offset += gap;
                candidate(offset, conf)
            })
            .collect();

        let consolidator = Consolidator::new(ConsolidatorConfig { tolerance_days: 60 });
        let once = consolidator.representatives(candidates.clone());
        let twice = consolidator.representatives(once.clone());
        prop_assert_eq!(&once, &candidates);
        prop_assert_eq!(&twice, &once);

        let stamp = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let records = consolidator.consolidate_at(candidates, stamp);
        prop_assert!(records.iter().all(|r| r.detection_date == stamp));
    }

    #[test]
    fn breakpoint_confidence_is_bounded(std_dev in 0.0f64..1e6, observations in 0usize..5000) {
        let confidence = breakpoint_confidence(std_dev, observations);
        prop_assert!((0.0..=1.0).contains(&confidence));
    }
}
