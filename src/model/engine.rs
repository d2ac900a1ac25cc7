//! Inference engine boundary.
//!
//! The change-point model never samples itself. It describes the
//! regime-switching specification of a window as a [`ModelSpec`] and hands
//! the window's log-returns to an [`InferenceEngine`], which returns
//! posterior draws keyed by parameter name.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use thiserror::Error;

use super::posterior::PosteriorSamples;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("Invalid inference input: {0}")]
    InvalidInput(String),

    #[error("Sampler failed: {0}")]
    Sampler(String),

    #[error("Posterior is missing parameter '{0}'")]
    MissingParameter(String),
}

pub type InferenceResult<T> = Result<T, InferenceError>;

/// Regime-switching model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    /// Two regimes split at one unknown index.
    SingleBreak,
    /// Three ordered regimes (pre, crisis, post) split at two unknown indices.
    DualBreak,
}

impl ModelVariant {
    /// Number of volatility regimes.
    pub fn regimes(&self) -> usize {
        match self {
            Self::SingleBreak => 2,
            Self::DualBreak => 3,
        }
    }
}

/// Sampler iteration counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Warm-up iterations.
    pub tune: usize,
    /// Posterior draws.
    pub draws: usize,
    /// Base seed. The scanner offsets it by window index.
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            tune: 2000,
            draws: 2000,
            seed: None,
        }
    }
}

impl SamplerConfig {
    /// Reduced counts for recurring incremental runs.
    pub fn incremental() -> Self {
        Self {
            tune: 1000,
            draws: 1000,
            seed: None,
        }
    }

    /// Copy with the seed offset by `offset`, if a base seed is set.
    pub fn with_seed_offset(&self, offset: u64) -> Self {
        Self {
            seed: self.seed.map(|s| s.wrapping_add(offset)),
            ..self.clone()
        }
    }
}

/// Support of a discrete breakpoint prior (inclusive bounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointSupport {
    pub lower: usize,
    pub upper: usize,
}

/// Model specification for one window.
///
/// Observation `i` is Normal(0, sigma_r) where `r` is the regime selected by
/// the breakpoints: regime 0 while `i <= tau_1`, regime 1 while
/// `tau_1 < i <= tau_2`, regime 2 afterwards.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub variant: ModelVariant,
    pub sampler: SamplerConfig,
    /// Empirical (population) standard deviation of the window's returns.
    pub empirical_std: f64,
    /// Number of observations in the window.
    pub observations: usize,
}

impl ModelSpec {
    /// Build the specification for a window of log-returns.
    pub fn for_window(variant: ModelVariant, returns: &[f64], sampler: SamplerConfig) -> Self {
        let empirical_std = if returns.len() > 1 {
            returns.iter().population_std_dev()
        } else {
            0.0
        };

        Self {
            variant,
            sampler,
            empirical_std,
            observations: returns.len(),
        }
    }

    /// Prior scale of each regime's volatility.
    ///
    /// Priors follow the window's own spread. The crisis regime of the
    /// dual-break model gets twice the scale.
    pub fn volatility_prior_scales(&self) -> Vec<f64> {
        match self.variant {
            ModelVariant::SingleBreak => vec![self.empirical_std; 2],
            ModelVariant::DualBreak => vec![
                self.empirical_std,
                self.empirical_std * 2.0,
                self.empirical_std,
            ],
        }
    }

    /// Prior support of each breakpoint.
    ///
    /// Dual-break: `tau_1` in the first half, `tau_2` in the second half,
    /// which keeps the crisis regime from collapsing onto either side.
    pub fn breakpoint_supports(&self) -> Vec<BreakpointSupport> {
        let n = self.observations;
        let last = n.saturating_sub(1);
        match self.variant {
            ModelVariant::SingleBreak => vec![BreakpointSupport {
                lower: 0,
                upper: last,
            }],
            ModelVariant::DualBreak => vec![
                BreakpointSupport {
                    lower: 0,
                    upper: n / 2,
                },
                BreakpointSupport {
                    lower: n / 2 + 1,
                    upper: last,
                },
            ],
        }
    }

    /// Half-open index ranges of each regime for the given breakpoints.
    pub fn regime_ranges(&self, taus: &[usize]) -> Vec<(usize, usize)> {
        let n = self.observations;
        let mut ranges = Vec::with_capacity(taus.len() + 1);
        let mut start = 0;
        for &tau in taus {
            let end = (tau + 1).min(n);
            ranges.push((start, end.max(start)));
            start = end.max(start);
        }
        ranges.push((start, n));
        ranges
    }
}

/// Posterior sampler for a regime-switching window.
///
/// Implementations must be shareable across the scanner's worker threads.
pub trait InferenceEngine: Send + Sync {
    /// Draw posterior samples for `returns` under `spec`.
    ///
    /// Dual-break posteriors must contain `tau_1`, `tau_2`, `sigma_1`,
    /// `sigma_2`, `sigma_3`; single-break posteriors `tau`, `sigma_1`,
    /// `sigma_2`.
    fn infer(&self, returns: &[f64], spec: &ModelSpec) -> InferenceResult<PosteriorSamples>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for &E {
    fn infer(&self, returns: &[f64], spec: &ModelSpec) -> InferenceResult<PosteriorSamples> {
        (**self).infer(returns, spec)
    }
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn infer(&self, returns: &[f64], spec: &ModelSpec) -> InferenceResult<PosteriorSamples> {
        (**self).infer(returns, spec)
    }
}
