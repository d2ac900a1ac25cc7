//! Exact grid posterior over breakpoint configurations.
//!
//! Each regime's variance gets a conjugate inverse-gamma prior whose mean is
//! the square of the regime's prior scale. With the variances integrated
//! out, the marginal likelihood of a breakpoint configuration is available
//! in closed form, so the discrete posterior is enumerated exactly over the
//! prior support instead of being explored by a chain. Breakpoint draws are
//! weighted samples from that posterior; each volatility draw comes from
//! the regime's conditional inverse-gamma posterior given the drawn
//! breakpoints.

use std::f64::consts::PI;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Gamma;
use statrs::function::gamma::ln_gamma;
use tracing::debug;

use super::engine::{InferenceEngine, InferenceError, InferenceResult, ModelSpec, ModelVariant};
use super::posterior::{PosteriorSamples, SIGMA_1, SIGMA_2, SIGMA_3, TAU, TAU_1, TAU_2};

/// Shape of the inverse-gamma variance prior.
const PRIOR_SHAPE: f64 = 2.0;

/// Grid posterior engine.
#[derive(Debug, Clone, Default)]
pub struct GridPosteriorEngine;

impl GridPosteriorEngine {
    pub fn new() -> Self {
        Self
    }
}

/// Sufficient statistics of the window: prefix sums of squared returns.
struct SquaredSums {
    prefix: Vec<f64>,
}

impl SquaredSums {
    fn new(returns: &[f64]) -> Self {
        let mut prefix = Vec::with_capacity(returns.len() + 1);
        prefix.push(0.0);
        let mut acc = 0.0;
        for r in returns {
            acc += r * r;
            prefix.push(acc);
        }
        Self { prefix }
    }

    /// Sum of squares over `[start, end)`.
    fn range(&self, start: usize, end: usize) -> f64 {
        self.prefix[end] - self.prefix[start]
    }
}

/// Inverse-gamma prior on one regime's variance.
#[derive(Debug, Clone, Copy)]
struct VariancePrior {
    shape: f64,
    rate: f64,
}

impl VariancePrior {
    fn from_scale(scale: f64) -> Self {
        Self {
            shape: PRIOR_SHAPE,
            rate: scale * scale * (PRIOR_SHAPE - 1.0),
        }
    }

    /// Conditional posterior parameters given `m` observations with sum of squares `ss`.
    fn posterior(&self, m: usize, ss: f64) -> (f64, f64) {
        (self.shape + m as f64 / 2.0, self.rate + ss / 2.0)
    }

    /// Log marginal likelihood of `m` zero-mean normal observations.
    fn log_marginal(&self, m: usize, ss: f64) -> f64 {
        if m == 0 {
            return 0.0;
        }
        let (shape, rate) = self.posterior(m, ss);
        self.shape * self.rate.ln() - ln_gamma(self.shape) + ln_gamma(shape)
            - shape * rate.ln()
            - (m as f64 / 2.0) * (2.0 * PI).ln()
    }
}

/// Every breakpoint configuration inside the prior support.
fn configurations(spec: &ModelSpec) -> Vec<Vec<usize>> {
    let supports = spec.breakpoint_supports();
    let mut configs: Vec<Vec<usize>> = vec![Vec::new()];

    for support in supports {
        let mut next = Vec::with_capacity(configs.len() * (support.upper - support.lower + 1));
        for config in &configs {
            for tau in support.lower..=support.upper {
                let mut extended = config.clone();
                extended.push(tau);
                next.push(extended);
            }
        }
        configs = next;
    }

    configs
}

fn validate_input(returns: &[f64], spec: &ModelSpec, scales: &[f64]) -> InferenceResult<()> {
    if returns.len() < 3 {
        return Err(InferenceError::InvalidInput(format!(
            "need at least 3 observations, got {}",
            returns.len()
        )));
    }
    if let Some(idx) = returns.iter().position(|r| !r.is_finite()) {
        return Err(InferenceError::InvalidInput(format!(
            "non-finite return at index {idx}"
        )));
    }
    if scales.iter().any(|s| !s.is_finite() || *s <= 0.0) {
        return Err(InferenceError::InvalidInput(
            "volatility prior scale must be positive".to_string(),
        ));
    }
    if spec.sampler.draws == 0 {
        return Err(InferenceError::InvalidInput(
            "draws must be positive".to_string(),
        ));
    }
    Ok(())
}

impl InferenceEngine for GridPosteriorEngine {
    fn infer(&self, returns: &[f64], spec: &ModelSpec) -> InferenceResult<PosteriorSamples> {
        let scales = spec.volatility_prior_scales();
        validate_input(returns, spec, &scales)?;

        let priors: Vec<VariancePrior> = scales.iter().map(|&s| VariancePrior::from_scale(s)).collect();
        let sums = SquaredSums::new(returns);
        let configs = configurations(spec);

        let log_weights: Vec<f64> = configs
            .iter()
            .map(|taus| {
                spec.regime_ranges(taus)
                    .iter()
                    .zip(&priors)
                    .map(|(&(start, end), prior)| {
                        prior.log_marginal(end - start, sums.range(start, end))
                    })
                    .sum()
            })
            .collect();

        let max_log = log_weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if !max_log.is_finite() {
            return Err(InferenceError::Sampler(
                "breakpoint posterior is degenerate".to_string(),
            ));
        }
        let weights: Vec<f64> = log_weights.iter().map(|w| (w - max_log).exp()).collect();
        let index = WeightedIndex::new(&weights)
            .map_err(|e| InferenceError::Sampler(e.to_string()))?;

        let mut rng = match spec.sampler.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        debug!(
            "Grid posterior over {} configurations, {} draws",
            configs.len(),
            spec.sampler.draws
        );

        let regimes = spec.variant.regimes();
        let mut tau_draws: Vec<Vec<usize>> = vec![Vec::with_capacity(spec.sampler.draws); regimes - 1];
        let mut sigma_draws: Vec<Vec<f64>> = vec![Vec::with_capacity(spec.sampler.draws); regimes];

        for _ in 0..spec.sampler.draws {
            let taus = &configs[index.sample(&mut rng)];
            for (trace, &tau) in tau_draws.iter_mut().zip(taus) {
                trace.push(tau);
            }

            for ((trace, &(start, end)), prior) in sigma_draws
                .iter_mut()
                .zip(&spec.regime_ranges(taus))
                .zip(&priors)
            {
                let (shape, rate) = prior.posterior(end - start, sums.range(start, end));
                let precision = Gamma::new(shape, rate)
                    .map_err(|e| InferenceError::Sampler(e.to_string()))?;
                trace.push((1.0 / precision.sample(&mut rng)).sqrt());
            }
        }

        let mut sigmas = sigma_draws.into_iter();
        let mut posterior = PosteriorSamples::new();
        match spec.variant {
            ModelVariant::SingleBreak => {
                posterior.insert_discrete(TAU, tau_draws.swap_remove(0));
            }
            ModelVariant::DualBreak => {
                let tau_2 = tau_draws.pop().unwrap_or_default();
                let tau_1 = tau_draws.pop().unwrap_or_default();
                posterior.insert_discrete(TAU_1, tau_1);
                posterior.insert_discrete(TAU_2, tau_2);
            }
        }
        for name in [SIGMA_1, SIGMA_2, SIGMA_3].iter().take(regimes) {
            posterior.insert_continuous(name, sigmas.next().unwrap_or_default());
        }

        Ok(posterior)
    }
}
