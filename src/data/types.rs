//! Core data types for crisis detection.
//!
//! A [`PriceSeries`] is the single source of observations for every phase of
//! the pipeline. It owns the daily prices, derives log-returns once at
//! construction and hands out date-bounded slices to the scanner.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SeriesError {
    #[error("Dates must be strictly increasing: {date} follows {previous}")]
    Unordered { previous: NaiveDate, date: NaiveDate },
}

/// A single daily observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Trading date (unique within a series).
    pub date: NaiveDate,

    /// Closing price.
    pub price: Decimal,

    /// ln(price_t / price_{t-1}). `None` for the first observation.
    pub log_return: Option<f64>,
}

/// Ordered daily price series with derived log-returns.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    observations: Vec<Observation>,
}

impl PriceSeries {
    /// Build a series from `(date, price)` pairs.
    ///
    /// Dates must already be strictly increasing. Non-positive prices are
    /// accepted here and surface later as non-finite log-returns, which the
    /// data quality check treats as critical.
    pub fn from_prices(prices: Vec<(NaiveDate, Decimal)>) -> Result<Self, SeriesError> {
        let mut observations: Vec<Observation> = Vec::with_capacity(prices.len());

        for (date, price) in prices {
            let log_return = match observations.last() {
                Some(prev) if date <= prev.date => {
                    return Err(SeriesError::Unordered {
                        previous: prev.date,
                        date,
                    });
                }
                Some(prev) => Some(log_return(prev.price, price)),
                None => None,
            };

            observations.push(Observation {
                date,
                price,
                log_return,
            });
        }

        Ok(Self { observations })
    }

    /// All observations, including the first (which has no log-return).
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Observations usable as model input (every observation but the first).
    pub fn modeling_observations(&self) -> &[Observation] {
        self.observations.get(1..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// First date available for modeling.
    pub fn first_modeling_date(&self) -> Option<NaiveDate> {
        self.modeling_observations().first().map(|o| o.date)
    }

    /// Last observed date.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    /// Modeling observations with `start <= date <= end`.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> &[Observation] {
        let obs = self.modeling_observations();
        let lo = obs.partition_point(|o| o.date < start);
        let hi = obs.partition_point(|o| o.date <= end);
        if lo >= hi {
            return &[];
        }
        &obs[lo..hi]
    }

    /// Modeling observations from `start` onwards.
    pub fn tail_from(&self, start: NaiveDate) -> &[Observation] {
        let obs = self.modeling_observations();
        let lo = obs.partition_point(|o| o.date < start);
        &obs[lo..]
    }

    /// Every log-return in the series, in date order.
    pub fn log_returns(&self) -> Vec<f64> {
        log_returns(&self.observations)
    }
}

/// Collect the log-returns of a slice of observations, skipping the missing one.
pub fn log_returns(observations: &[Observation]) -> Vec<f64> {
    observations.iter().filter_map(|o| o.log_return).collect()
}

fn log_return(previous: Decimal, current: Decimal) -> f64 {
    let prev = previous.to_f64().unwrap_or(f64::NAN);
    let curr = current.to_f64().unwrap_or(f64::NAN);
    (curr / prev).ln()
}

/// A curated historical event used only for validating detections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthEvent {
    pub event_date: NaiveDate,
    pub description: String,
}

impl GroundTruthEvent {
    pub fn new(event_date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            event_date,
            description: description.into(),
        }
    }
}
