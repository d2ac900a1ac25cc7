//! Bayesian change-point model.
//!
//! The model specifies regime-switching volatility for a window, delegates
//! sampling to an [`InferenceEngine`] and reduces posterior draws to crisis
//! boundaries, regime volatilities and a detection confidence.

pub mod candidate;
pub mod change_point;
pub mod engine;
pub mod grid;
pub mod posterior;

pub use candidate::{round_to, Candidate};
pub use change_point::{
    breakpoint_confidence, centered_bounds, extract_dual_break, extract_single_break,
    volatility_ratio, ChangePointConfig, ChangePointModel, DualBreakEstimate, SingleBreakEstimate,
    WindowVerdict,
};
pub use engine::{
    BreakpointSupport, InferenceEngine, InferenceError, InferenceResult, ModelSpec, ModelVariant,
    SamplerConfig,
};
pub use grid::GridPosteriorEngine;
pub use posterior::{posterior_mean, summarize_index, IndexSummary, PosteriorSamples};
