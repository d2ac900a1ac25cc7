//! Summary statistics over labeled days.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::labeler::{Regime, RegimeDay};

/// A contiguous run of Crisis days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: usize,
    pub avg_volatility: f64,
}

/// Regime report for a labeled series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegimeReport {
    pub total_days: usize,
    pub distribution: BTreeMap<Regime, usize>,
    pub avg_volatility: BTreeMap<Regime, f64>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub crisis_periods: Vec<CrisisPeriod>,
}

impl RegimeReport {
    /// Build the report from days in date order.
    pub fn from_days(days: &[RegimeDay]) -> Self {
        let mut distribution: BTreeMap<Regime, usize> = BTreeMap::new();
        let mut volatility_sums: BTreeMap<Regime, f64> = BTreeMap::new();

        for day in days {
            *distribution.entry(day.regime).or_insert(0) += 1;
            *volatility_sums.entry(day.regime).or_insert(0.0) += day.volatility;
        }

        let avg_volatility = volatility_sums
            .into_iter()
            .map(|(regime, sum)| (regime, sum / distribution[&regime] as f64))
            .collect();

        let date_range = match (days.first(), days.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date)),
            _ => None,
        };

        Self {
            total_days: days.len(),
            distribution,
            avg_volatility,
            date_range,
            crisis_periods: crisis_periods(days),
        }
    }

    pub fn days_in(&self, regime: Regime) -> usize {
        self.distribution.get(&regime).copied().unwrap_or(0)
    }

    pub fn summary(&self) -> String {
        let range = match self.date_range {
            Some((start, end)) => format!("{} to {}", start, end),
            None => "empty".to_string(),
        };
        format!(
            "Regime Report: {} days ({})\n\
             Normal: {} | Crisis: {} | Recovery: {}\n\
             Crisis Periods: {}",
            self.total_days,
            range,
            self.days_in(Regime::Normal),
            self.days_in(Regime::Crisis),
            self.days_in(Regime::Recovery),
            self.crisis_periods.len()
        )
    }

    pub fn log(&self) {
        info!("Regime report:");
        info!("  Total days: {}", self.total_days);
        if let Some((start, end)) = self.date_range {
            info!("  Date range: {} to {}", start, end);
        }
        info!("  Crisis periods: {}", self.crisis_periods.len());
        for (regime, count) in &self.distribution {
            info!("  {}: {} days", regime, count);
        }
        for (regime, vol) in &self.avg_volatility {
            info!("  Avg volatility {}: {:.5}", regime, vol);
        }
    }
}

fn crisis_periods(days: &[RegimeDay]) -> Vec<CrisisPeriod> {
    let mut periods = Vec::new();
    let mut current: Option<(NaiveDate, NaiveDate, usize, f64)> = None;

    for day in days {
        if day.regime == Regime::Crisis {
            current = Some(match current {
                Some((start, _, count, sum)) => (start, day.date, count + 1, sum + day.volatility),
                None => (day.date, day.date, 1, day.volatility),
            });
        } else if let Some((start, end, count, sum)) = current.take() {
            periods.push(CrisisPeriod {
                start,
                end,
                days: count,
                avg_volatility: sum / count as f64,
            });
        }
    }

    if let Some((start, end, count, sum)) = current {
        periods.push(CrisisPeriod {
            start,
            end,
            days: count,
            avg_volatility: sum / count as f64,
        });
    }
    periods
}
