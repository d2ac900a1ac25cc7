//! Daily regime labeling.
//!
//! Projects canonical crisis records onto every observation date. Each crisis
//! claims three ranges, applied in crisis start order so a later crisis
//! overwrites an earlier one where their margins overlap:
//!
//! - Pre-crisis `[start - margin, start)`: Normal at the pre-crisis volatility
//! - Crisis `[start, end]`: Crisis at the crisis volatility
//! - Recovery `(end, end + margin]`: Recovery at the post-crisis volatility
//!
//! Days claimed by no crisis are Normal with a baseline volatility estimated
//! from those days' own log-returns.

use std::collections::HashMap;
use std::fmt;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::{info, warn};

use crate::consolidation::ConsolidatedChangePoint;
use crate::data::{log_returns, Observation};

/// Volatility regime of a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Regime {
    Normal,
    Crisis,
    Recovery,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Crisis => "Crisis",
            Self::Recovery => "Recovery",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regime assignment for one observation date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeDay {
    pub date: NaiveDate,
    pub price: Decimal,
    pub regime: Regime,
    /// Expected daily volatility (standard deviation of log-returns).
    pub volatility: f64,
    pub confidence: f64,
}

/// Labeler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeLabelerConfig {
    /// Days before a crisis start labeled with the pre-crisis volatility.
    pub pre_crisis_days: i64,
    /// Days after a crisis end labeled Recovery.
    pub recovery_days: i64,
    /// Confidence of days outside every crisis when crises exist.
    pub baseline_confidence: f64,
    /// Confidence of every day when no crisis exists.
    pub no_crisis_confidence: f64,
}

impl Default for RegimeLabelerConfig {
    fn default() -> Self {
        Self {
            pre_crisis_days: 30,
            recovery_days: 30,
            baseline_confidence: 0.8,
            no_crisis_confidence: 1.0,
        }
    }
}

/// Sample standard deviation, `None` below two values.
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let std_dev = values.iter().std_dev();
    std_dev.is_finite().then_some(std_dev)
}

/// Labels observation dates from canonical crisis records.
#[derive(Debug, Clone, Default)]
pub struct RegimeLabeler {
    config: RegimeLabelerConfig,
}

impl RegimeLabeler {
    pub fn new(config: RegimeLabelerConfig) -> Self {
        Self { config }
    }

    /// One [`RegimeDay`] per observation, in date order.
    pub fn assign_regimes(
        &self,
        observations: &[Observation],
        crises: &[ConsolidatedChangePoint],
    ) -> Vec<RegimeDay> {
        let full_std = sample_std(&log_returns(observations)).unwrap_or(0.0);

        let mut days: Vec<RegimeDay> = observations
            .iter()
            .map(|o| RegimeDay {
                date: o.date,
                price: o.price,
                regime: Regime::Normal,
                volatility: full_std,
                confidence: self.config.no_crisis_confidence,
            })
            .collect();

        if crises.is_empty() {
            info!("No crises detected; all {} days labeled Normal", days.len());
            return days;
        }

        let mut ordered: Vec<&ConsolidatedChangePoint> = crises.iter().collect();
        ordered.sort_by_key(|c| c.start_date());

        let mut claimed = vec![false; days.len()];
        for crisis in ordered {
            self.apply_crisis(&mut days, &mut claimed, crisis);
        }

        let baseline_returns: Vec<f64> = observations
            .iter()
            .zip(&claimed)
            .filter(|(_, claimed)| !**claimed)
            .filter_map(|(o, _)| o.log_return)
            .filter(|r| r.is_finite())
            .collect();
        let baseline = match sample_std(&baseline_returns) {
            Some(std_dev) => std_dev,
            None => {
                warn!(
                    "Only {} baseline returns; falling back to full-series volatility",
                    baseline_returns.len()
                );
                full_std
            }
        };

        for (day, _) in days.iter_mut().zip(&claimed).filter(|(_, c)| !**c) {
            day.volatility = baseline;
            day.confidence = self.config.baseline_confidence;
        }

        log_distribution(&days);
        days
    }

    fn apply_crisis(
        &self,
        days: &mut [RegimeDay],
        claimed: &mut [bool],
        crisis: &ConsolidatedChangePoint,
    ) {
        let start = crisis.start_date();
        let end = crisis.end_date();
        let pre_start = start - Duration::days(self.config.pre_crisis_days);
        let recovery_end = end + Duration::days(self.config.recovery_days);
        let record = &crisis.candidate;

        for (day, claimed) in days.iter_mut().zip(claimed.iter_mut()) {
            let assignment = if day.date >= start && day.date <= end {
                Some((Regime::Crisis, record.volatility_crisis))
            } else if day.date >= pre_start && day.date < start {
                Some((Regime::Normal, record.volatility_pre))
            } else if day.date > end && day.date <= recovery_end {
                Some((Regime::Recovery, record.volatility_post))
            } else {
                None
            };

            if let Some((regime, volatility)) = assignment {
                day.regime = regime;
                day.volatility = volatility;
                day.confidence = record.detection_confidence;
                *claimed = true;
            }
        }
    }
}

/// Days of `current` that are new or differ from `previous`.
pub fn changed_days(previous: &[RegimeDay], current: &[RegimeDay]) -> Vec<RegimeDay> {
    let existing: HashMap<NaiveDate, &RegimeDay> = previous.iter().map(|d| (d.date, d)).collect();
    current
        .iter()
        .filter(|day| existing.get(&day.date).map_or(true, |old| *old != *day))
        .cloned()
        .collect()
}

fn log_distribution(days: &[RegimeDay]) {
    let mut counts: HashMap<Regime, usize> = HashMap::new();
    for day in days {
        *counts.entry(day.regime).or_insert(0) += 1;
    }

    info!("Regime distribution:");
    for regime in [Regime::Normal, Regime::Crisis, Regime::Recovery] {
        let count = counts.get(&regime).copied().unwrap_or(0);
        let pct = if days.is_empty() {
            0.0
        } else {
            count as f64 / days.len() as f64 * 100.0
        };
        info!("  {}: {} days ({:.1}%)", regime, count, pct);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Candidate;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn daily_series(start: NaiveDate, end: NaiveDate) -> Vec<Observation> {
        let mut observations = Vec::new();
        let mut price = 80.0f64;
        let mut day = start;
        let mut i = 0;
        while day <= end {
            let log_return = if i == 0 {
                None
            } else {
                let r = if i % 2 == 0 { 0.012 } else { -0.008 };
                price *= f64::exp(r);
                Some(r)
            };
            observations.push(Observation {
                date: day,
                price: Decimal::from_f64(price).unwrap(),
                log_return,
            });
            day += Duration::days(1);
            i += 1;
        }
        observations
    }

    fn crisis(start: NaiveDate, end: NaiveDate, sigmas: [f64; 3], confidence: f64) -> ConsolidatedChangePoint {
        ConsolidatedChangePoint::new(
            Candidate {
                crisis_start_date: start,
                crisis_end_date: end,
                volatility_pre: sigmas[0],
                volatility_crisis: sigmas[1],
                volatility_post: sigmas[2],
                detection_confidence: confidence,
                window_size_days: 365,
                notes: String::new(),
            },
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    fn day_at(days: &[RegimeDay], d: NaiveDate) -> &RegimeDay {
        days.iter().find(|day| day.date == d).unwrap()
    }

    #[test]
    fn test_no_crises_all_normal() {
        let observations = daily_series(date(2020, 1, 1), date(2020, 3, 1));
        let days = RegimeLabeler::default().assign_regimes(&observations, &[]);

        assert_eq!(days.len(), observations.len());
        let expected = sample_std(&log_returns(&observations)).unwrap();
        for day in &days {
            assert_eq!(day.regime, Regime::Normal);
            assert_relative_eq!(day.volatility, expected);
            assert_relative_eq!(day.confidence, 1.0);
        }
    }

    #[test]
    fn test_crisis_ranges() {
        let observations = daily_series(date(2008, 1, 1), date(2009, 12, 31));
        let crises = vec![crisis(date(2008, 9, 1), date(2009, 3, 1), [0.01, 0.05, 0.02], 0.9)];
        let days = RegimeLabeler::default().assign_regimes(&observations, &crises);

        assert_eq!(days.len(), observations.len());

        let pre = day_at(&days, date(2008, 8, 15));
        assert_eq!(pre.regime, Regime::Normal);
        assert_relative_eq!(pre.volatility, 0.01);
        assert_relative_eq!(pre.confidence, 0.9);

        let inside = day_at(&days, date(2008, 9, 1));
        assert_eq!(inside.regime, Regime::Crisis);
        assert_relative_eq!(inside.volatility, 0.05);
        assert_eq!(day_at(&days, date(2009, 3, 1)).regime, Regime::Crisis);

        let recovery = day_at(&days, date(2009, 3, 20));
        assert_eq!(recovery.regime, Regime::Recovery);
        assert_relative_eq!(recovery.volatility, 0.02);
        assert_eq!(day_at(&days, date(2009, 3, 31)).regime, Regime::Recovery);

        let baseline = day_at(&days, date(2009, 5, 1));
        assert_eq!(baseline.regime, Regime::Normal);
        assert_relative_eq!(baseline.confidence, 0.8);
        let unclaimed: Vec<Observation> = observations
            .iter()
            .filter(|o| o.date < date(2008, 8, 2) || o.date > date(2009, 3, 31))
            .cloned()
            .collect();
        let expected = sample_std(&log_returns(&unclaimed)).unwrap();
        assert_relative_eq!(baseline.volatility, expected, epsilon = 1e-12);

        // first margin day and the day before it
        assert_relative_eq!(day_at(&days, date(2008, 8, 2)).volatility, 0.01);
        assert_relative_eq!(day_at(&days, date(2008, 8, 1)).confidence, 0.8);
    }

    #[test]
    fn test_later_crisis_overwrites_margin() {
        let observations = daily_series(date(2010, 1, 1), date(2011, 12, 31));
        let crises = vec![
            crisis(date(2010, 6, 1), date(2010, 8, 1), [0.01, 0.04, 0.02], 0.9),
            crisis(date(2010, 8, 20), date(2010, 10, 1), [0.015, 0.06, 0.025], 0.75),
        ];
        let days = RegimeLabeler::default().assign_regimes(&observations, &crises);

        // recovery of the first crisis, but inside the second's pre-crisis margin
        let overlap = day_at(&days, date(2010, 8, 10));
        assert_eq!(overlap.regime, Regime::Normal);
        assert_relative_eq!(overlap.volatility, 0.015);
        assert_relative_eq!(overlap.confidence, 0.75);
    }

    #[test]
    fn test_baseline_fallback_when_everything_claimed() {
        let observations = daily_series(date(2020, 1, 1), date(2020, 2, 1));
        let crises = vec![crisis(date(2020, 1, 5), date(2020, 1, 20), [0.01, 0.03, 0.01], 0.85)];
        let days = RegimeLabeler::default().assign_regimes(&observations, &crises);
        assert!(days.iter().all(|d| d.confidence == 0.85));
    }

    #[test]
    fn test_changed_days() {
        let base = RegimeDay {
            date: date(2020, 1, 1),
            price: dec!(10),
            regime: Regime::Normal,
            volatility: 0.01,
            confidence: 0.8,
        };
        let previous = vec![base.clone()];
        let mut updated = base.clone();
        updated.regime = Regime::Crisis;
        let added = RegimeDay {
            date: date(2020, 1, 2),
            ..base.clone()
        };

        assert!(changed_days(&previous, &previous).is_empty());
        let changed = changed_days(&previous, &[updated.clone(), added.clone()]);
        assert_eq!(changed, vec![updated, added]);
    }

    #[test]
    fn test_regime_serializes_as_string() {
        assert_eq!(serde_json::to_string(&Regime::Recovery).unwrap(), "\"Recovery\"");
        assert_eq!(Regime::Crisis.to_string(), "Crisis");
    }
}
