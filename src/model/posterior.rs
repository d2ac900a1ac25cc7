//! Posterior sample collections returned by an inference engine.

use std::collections::BTreeMap;

use statrs::statistics::{Data, Median, Statistics};

use super::engine::InferenceError;

/// Breakpoint of the single-break model.
pub const TAU: &str = "tau";
/// First breakpoint of the dual-break model (start of the crisis regime).
pub const TAU_1: &str = "tau_1";
/// Second breakpoint of the dual-break model (end of the crisis regime).
pub const TAU_2: &str = "tau_2";
/// Volatility of the first regime.
pub const SIGMA_1: &str = "sigma_1";
/// Volatility of the second regime.
pub const SIGMA_2: &str = "sigma_2";
/// Volatility of the third regime (dual-break only).
pub const SIGMA_3: &str = "sigma_3";

/// Posterior draws keyed by parameter name.
///
/// Breakpoints are discrete window indices; volatilities are continuous.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PosteriorSamples {
    discrete: BTreeMap<String, Vec<usize>>,
    continuous: BTreeMap<String, Vec<f64>>,
}

impl PosteriorSamples {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert_discrete`](Self::insert_discrete).
    pub fn with_discrete(mut self, name: &str, samples: Vec<usize>) -> Self {
        self.insert_discrete(name, samples);
        self
    }

    /// Builder form of [`insert_continuous`](Self::insert_continuous).
    pub fn with_continuous(mut self, name: &str, samples: Vec<f64>) -> Self {
        self.insert_continuous(name, samples);
        self
    }

    pub fn insert_discrete(&mut self, name: &str, samples: Vec<usize>) {
        self.discrete.insert(name.to_string(), samples);
    }

    pub fn insert_continuous(&mut self, name: &str, samples: Vec<f64>) {
        self.continuous.insert(name.to_string(), samples);
    }

    /// Draws of a discrete parameter.
    pub fn discrete(&self, name: &str) -> Result<&[usize], InferenceError> {
        self.discrete
            .get(name)
            .filter(|s| !s.is_empty())
            .map(Vec::as_slice)
            .ok_or_else(|| InferenceError::MissingParameter(name.to_string()))
    }

    /// Draws of a continuous parameter.
    pub fn continuous(&self, name: &str) -> Result<&[f64], InferenceError> {
        self.continuous
            .get(name)
            .filter(|s| !s.is_empty())
            .map(Vec::as_slice)
            .ok_or_else(|| InferenceError::MissingParameter(name.to_string()))
    }

    /// Number of draws (length of the longest trace).
    pub fn draws(&self) -> usize {
        self.discrete
            .values()
            .map(Vec::len)
            .chain(self.continuous.values().map(Vec::len))
            .max()
            .unwrap_or(0)
    }
}

/// Summary of a discrete breakpoint trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexSummary {
    /// Median index, truncated toward zero.
    pub median: usize,
    /// Population standard deviation of the draws.
    pub std_dev: f64,
}

/// Summarize a breakpoint trace by median and spread.
pub fn summarize_index(samples: &[usize]) -> IndexSummary {
    let values: Vec<f64> = samples.iter().map(|&s| s as f64).collect();
    let std_dev = if values.len() > 1 {
        values.iter().population_std_dev()
    } else {
        0.0
    };
    let median = Data::new(values).median();

    IndexSummary {
        median: if median.is_finite() { median as usize } else { 0 },
        std_dev,
    }
}

/// Mean of a continuous trace.
pub fn posterior_mean(samples: &[f64]) -> f64 {
    samples.iter().mean()
}
