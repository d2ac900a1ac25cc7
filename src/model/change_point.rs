//! Regime-switching change-point model.
//!
//! Builds a window of log-returns around a center date, hands it to an
//! [`InferenceEngine`] and reduces the posterior to point estimates:
//!
//! - breakpoint date: window date at the median posterior index
//! - regime volatility: posterior mean
//! - breakpoint confidence: `max(0, 1 - std / (n / 4))`
//! - volatility ratio: `sigma_crisis / mean(sigma_pre, sigma_post)`

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::engine::{InferenceEngine, InferenceError, InferenceResult, ModelSpec, ModelVariant, SamplerConfig};
use super::posterior::{
    posterior_mean, summarize_index, PosteriorSamples, SIGMA_1, SIGMA_2, SIGMA_3, TAU, TAU_1, TAU_2,
};
use crate::data::{log_returns, Observation, PriceSeries};

/// Acceptance thresholds of the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangePointConfig {
    /// Windows with fewer observations are not analyzed.
    pub min_observations: usize,
    /// Dual-break estimates below this crisis/normal volatility ratio are discarded.
    pub min_volatility_ratio: f64,
}

impl Default for ChangePointConfig {
    fn default() -> Self {
        Self {
            min_observations: 100,
            min_volatility_ratio: 1.5,
        }
    }
}

/// Point estimates of a dual-break posterior.
#[derive(Debug, Clone, PartialEq)]
pub struct DualBreakEstimate {
    pub crisis_start_date: NaiveDate,
    pub crisis_end_date: NaiveDate,
    pub tau_1: usize,
    pub tau_2: usize,
    pub volatility_pre: f64,
    pub volatility_crisis: f64,
    pub volatility_post: f64,
    pub confidence_start: f64,
    pub confidence_end: f64,
    /// Mean of the two breakpoint confidences.
    pub confidence: f64,
    pub volatility_ratio: f64,
    pub observations: usize,
}

/// Point estimates of a single-break posterior.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleBreakEstimate {
    pub breakpoint_date: NaiveDate,
    /// Most frequent posterior index.
    pub tau: usize,
    pub volatility_before: f64,
    pub volatility_after: f64,
    /// Relative volatility change in percent, two decimals.
    pub volatility_change_pct: f64,
    pub confidence: f64,
}

/// Outcome of analyzing one window.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowVerdict {
    /// Too few observations to fit three regimes.
    InsufficientData { observations: usize },
    /// The crisis regime is not volatile enough relative to its neighbours.
    LowVolatilityRatio { estimate: DualBreakEstimate },
    Detected(DualBreakEstimate),
}

impl WindowVerdict {
    pub fn estimate(&self) -> Option<&DualBreakEstimate> {
        match self {
            Self::Detected(estimate) => Some(estimate),
            _ => None,
        }
    }
}

/// Window bounds `[center - size/2, center - size/2 + size]`.
pub fn centered_bounds(center: NaiveDate, window_size_days: i64) -> (NaiveDate, NaiveDate) {
    let start = center - Duration::days(window_size_days / 2);
    (start, start + Duration::days(window_size_days))
}

/// Confidence of one breakpoint from the spread of its posterior.
///
/// A spread of a quarter of the window or more means no confidence.
pub fn breakpoint_confidence(std_dev: f64, observations: usize) -> f64 {
    let max_std = observations as f64 / 4.0;
    if max_std <= 0.0 {
        return 0.0;
    }
    (1.0 - std_dev / max_std).clamp(0.0, 1.0)
}

/// `sigma_crisis / mean(sigma_pre, sigma_post)`, zero when undefined.
pub fn volatility_ratio(pre: f64, crisis: f64, post: f64) -> f64 {
    let baseline = (pre + post) / 2.0;
    if baseline > 0.0 && crisis.is_finite() {
        crisis / baseline
    } else {
        0.0
    }
}

fn date_at(observations: &[Observation], idx: usize) -> InferenceResult<NaiveDate> {
    observations.get(idx).map(|o| o.date).ok_or_else(|| {
        InferenceError::Sampler(format!(
            "breakpoint index {idx} outside window of {} observations",
            observations.len()
        ))
    })
}

/// Reduce a dual-break posterior over `observations` to point estimates.
pub fn extract_dual_break(
    observations: &[Observation],
    posterior: &PosteriorSamples,
) -> InferenceResult<DualBreakEstimate> {
    let n = observations.len();
    let tau_1 = summarize_index(posterior.discrete(TAU_1)?);
    let tau_2 = summarize_index(posterior.discrete(TAU_2)?);

    let volatility_pre = posterior_mean(posterior.continuous(SIGMA_1)?);
    let volatility_crisis = posterior_mean(posterior.continuous(SIGMA_2)?);
    let volatility_post = posterior_mean(posterior.continuous(SIGMA_3)?);

    let confidence_start = breakpoint_confidence(tau_1.std_dev, n);
    let confidence_end = breakpoint_confidence(tau_2.std_dev, n);

    Ok(DualBreakEstimate {
        crisis_start_date: date_at(observations, tau_1.median)?,
        crisis_end_date: date_at(observations, tau_2.median)?,
        tau_1: tau_1.median,
        tau_2: tau_2.median,
        volatility_pre,
        volatility_crisis,
        volatility_post,
        confidence_start,
        confidence_end,
        confidence: (confidence_start + confidence_end) / 2.0,
        volatility_ratio: volatility_ratio(volatility_pre, volatility_crisis, volatility_post),
        observations: n,
    })
}

/// Most frequent value, smallest on ties.
fn mode(samples: &[usize]) -> Option<usize> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for &s in samples {
        *counts.entry(s).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(value, _)| value)
}

/// Reduce a single-break posterior over `observations` to point estimates.
pub fn extract_single_break(
    observations: &[Observation],
    posterior: &PosteriorSamples,
) -> InferenceResult<SingleBreakEstimate> {
    let samples = posterior.discrete(TAU)?;
    let tau = mode(samples).ok_or_else(|| InferenceError::MissingParameter(TAU.to_string()))?;
    let spread = summarize_index(samples);

    let volatility_before = posterior_mean(posterior.continuous(SIGMA_1)?);
    let volatility_after = posterior_mean(posterior.continuous(SIGMA_2)?);
    let volatility_change_pct = if volatility_before > 0.0 {
        super::candidate::round_to((volatility_after - volatility_before) / volatility_before * 100.0, 2)
    } else {
        0.0
    };

    Ok(SingleBreakEstimate {
        breakpoint_date: date_at(observations, tau)?,
        tau,
        volatility_before,
        volatility_after,
        volatility_change_pct,
        confidence: breakpoint_confidence(spread.std_dev, observations.len()),
    })
}

/// Change-point model bound to an inference engine.
pub struct ChangePointModel<E> {
    engine: E,
    config: ChangePointConfig,
}

impl<E: InferenceEngine> ChangePointModel<E> {
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, ChangePointConfig::default())
    }

    pub fn with_config(engine: E, config: ChangePointConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &ChangePointConfig {
        &self.config
    }

    /// Run the dual-break model on a window of observations.
    pub fn analyze_window(
        &self,
        observations: &[Observation],
        sampler: &SamplerConfig,
    ) -> InferenceResult<WindowVerdict> {
        if observations.len() < self.config.min_observations {
            return Ok(WindowVerdict::InsufficientData {
                observations: observations.len(),
            });
        }

        let returns = log_returns(observations);
        if returns.len() != observations.len() {
            return Err(InferenceError::InvalidInput(
                "window contains observations without a log-return".to_string(),
            ));
        }

        let spec = ModelSpec::for_window(ModelVariant::DualBreak, &returns, sampler.clone());
        let posterior = self.engine.infer(&returns, &spec)?;
        let estimate = extract_dual_break(observations, &posterior)?;

        debug!(
            "Window {} obs: tau_1={} tau_2={} confidence={:.3} ratio={:.2}",
            estimate.observations,
            estimate.tau_1,
            estimate.tau_2,
            estimate.confidence,
            estimate.volatility_ratio
        );

        if estimate.volatility_ratio < self.config.min_volatility_ratio {
            return Ok(WindowVerdict::LowVolatilityRatio { estimate });
        }
        Ok(WindowVerdict::Detected(estimate))
    }

    /// Analyze the window of `window_size_days` centered on `center`.
    ///
    /// Returns the observations analyzed alongside the verdict.
    pub fn analyze_event<'a>(
        &self,
        series: &'a PriceSeries,
        center: NaiveDate,
        window_size_days: i64,
        sampler: &SamplerConfig,
    ) -> InferenceResult<(&'a [Observation], WindowVerdict)> {
        let (start, end) = centered_bounds(center, window_size_days);
        let window = series.window(start, end);
        let verdict = self.analyze_window(window, sampler)?;
        Ok((window, verdict))
    }

    /// Run the single-break model on the window centered on `center`.
    ///
    /// `None` when the window is too short.
    pub fn analyze_single_break(
        &self,
        series: &PriceSeries,
        center: NaiveDate,
        window_size_days: i64,
        sampler: &SamplerConfig,
    ) -> InferenceResult<Option<SingleBreakEstimate>> {
        let (start, end) = centered_bounds(center, window_size_days);
        let window = series.window(start, end);
        if window.len() < self.config.min_observations {
            return Ok(None);
        }

        let returns = log_returns(window);
        let spec = ModelSpec::for_window(ModelVariant::SingleBreak, &returns, sampler.clone());
        let posterior = self.engine.infer(&returns, &spec)?;
        extract_single_break(window, &posterior).map(Some)
    }
}
