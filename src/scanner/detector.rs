//! Sliding-window crisis scanner.
//!
//! Walks the whole history with overlapping windows, runs the dual-break
//! model on each window in parallel, keeps the windows whose estimate clears
//! the confidence and volatility-ratio thresholds, consolidates the
//! survivors and persists them.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Duration, NaiveDate, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::windows::{ScanWindow, SlidingWindows};
use crate::consolidation::{ConsolidatedChangePoint, Consolidator};
use crate::data::PriceSeries;
use crate::model::candidate::CONFIDENCE_DECIMALS;
use crate::model::{
    round_to, Candidate, ChangePointModel, InferenceEngine, SamplerConfig, WindowVerdict,
};
use crate::store::{CrisisStore, StoreError};
use crate::validation::DataQualityValidator;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("No usable observations in series")]
    NoData,

    #[error("Data quality check failed: {0}")]
    DataQuality(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

pub type ScanResult<T> = Result<T, ScanError>;

/// Scanner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Window span in calendar days.
    pub window_size_days: i64,
    /// Distance between consecutive window starts.
    pub step_size_days: i64,
    /// Minimum detection confidence for a window to yield a candidate.
    pub min_confidence: f64,
    /// Worker threads for window analysis. 0 uses one per core.
    pub max_workers: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            window_size_days: 365,
            step_size_days: 90,
            min_confidence: 0.70,
            max_workers: 0,
        }
    }
}

/// Per-window result.
#[derive(Debug, Clone)]
enum WindowOutcome {
    Accepted(Candidate),
    InsufficientData,
    LowVolatilityRatio,
    LowConfidence,
    Failed,
}

/// Counts of window outcomes in a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub windows: usize,
    pub accepted: usize,
    pub insufficient_data: usize,
    pub low_volatility_ratio: usize,
    pub low_confidence: usize,
    pub failed: usize,
}

impl ScanStats {
    fn record(&mut self, outcome: &WindowOutcome) {
        self.windows += 1;
        match outcome {
            WindowOutcome::Accepted(_) => self.accepted += 1,
            WindowOutcome::InsufficientData => self.insufficient_data += 1,
            WindowOutcome::LowVolatilityRatio => self.low_volatility_ratio += 1,
            WindowOutcome::LowConfidence => self.low_confidence += 1,
            WindowOutcome::Failed => self.failed += 1,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} windows: {} accepted, {} low confidence, {} low volatility ratio, {} short, {} failed",
            self.windows,
            self.accepted,
            self.low_confidence,
            self.low_volatility_ratio,
            self.insufficient_data,
            self.failed
        )
    }
}

/// Candidates of a scan, in window order.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub candidates: Vec<Candidate>,
    pub stats: ScanStats,
}

/// Sliding-window scanner over one price series.
pub struct WindowScanner<E> {
    model: ChangePointModel<E>,
    config: ScannerConfig,
    quality: DataQualityValidator,
    consolidator: Consolidator,
}

impl<E: InferenceEngine> WindowScanner<E> {
    pub fn new(model: ChangePointModel<E>, config: ScannerConfig) -> Self {
        Self {
            model,
            config,
            quality: DataQualityValidator::default(),
            consolidator: Consolidator::default(),
        }
    }

    pub fn with_quality_validator(mut self, quality: DataQualityValidator) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_consolidator(mut self, consolidator: Consolidator) -> Self {
        self.consolidator = consolidator;
        self
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn model(&self) -> &ChangePointModel<E> {
        &self.model
    }

    /// Windows with enough observations, indexed in scan order.
    pub fn windows(&self, series: &PriceSeries) -> Vec<ScanWindow> {
        let (Some(first), Some(last)) = (series.first_modeling_date(), series.last_date()) else {
            return Vec::new();
        };

        let min_observations = self.model.config().min_observations;
        SlidingWindows::new(
            self.config.window_size_days,
            self.config.step_size_days,
            first,
            last,
        )
        .generate()
        .into_iter()
        .filter(|w| {
            let count = series.window(w.start, w.end).len();
            if count < min_observations {
                debug!("Skipping window {} to {}: {} observations", w.start, w.end, count);
            }
            count >= min_observations
        })
        .enumerate()
        .map(|(index, w)| ScanWindow { index, ..w })
        .collect()
    }

    /// Rescan the whole history and replace the stored crisis set.
    ///
    /// Fails before any window is analyzed when the series is empty or a
    /// critical data quality check fails.
    pub fn run_full_scan(
        &self,
        series: &PriceSeries,
        store: &dyn CrisisStore,
        sampler: &SamplerConfig,
    ) -> ScanResult<Vec<ConsolidatedChangePoint>> {
        info!("Starting full crisis scan");
        info!("  Window size: {} days", self.config.window_size_days);
        info!("  Step size: {} days", self.config.step_size_days);
        info!("  Min confidence: {}", self.config.min_confidence);

        let outcome = self.scan_candidates(series, sampler)?;
        info!("Scan complete: {}", outcome.stats.summary());

        let consolidated = self.consolidator.consolidate(outcome.candidates);
        store.replace_all(&consolidated)?;
        info!("Stored {} crisis records", consolidated.len());

        Ok(consolidated)
    }

    /// Validate the series and analyze every window, without persisting.
    pub fn scan_candidates(
        &self,
        series: &PriceSeries,
        sampler: &SamplerConfig,
    ) -> ScanResult<ScanOutcome> {
        if series.modeling_observations().is_empty() {
            return Err(ScanError::NoData);
        }

        let report = self.quality.validate(series);
        if report.has_critical_failure() {
            return Err(ScanError::DataQuality(report.summary()));
        }

        let windows = self.windows(series);
        info!("Processing {} windows", windows.len());
        if windows.is_empty() {
            return Ok(ScanOutcome::default());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers)
            .build()
            .map_err(|e| ScanError::WorkerPool(e.to_string()))?;

        let progress = AtomicUsize::new(0);
        let total = windows.len();

        let outcomes: Vec<WindowOutcome> = pool.install(|| {
            windows
                .par_iter()
                .map(|window| {
                    let outcome = self.analyze(series, window, sampler);

                    let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % (total / 10).max(1) == 0 || done == total {
                        info!(
                            "  {:.0}% ({}/{} windows)",
                            done as f64 / total as f64 * 100.0,
                            done,
                            total
                        );
                    }
                    outcome
                })
                .collect()
        });

        let mut result = ScanOutcome::default();
        for outcome in outcomes {
            result.stats.record(&outcome);
            if let WindowOutcome::Accepted(candidate) = outcome {
                result.candidates.push(candidate);
            }
        }
        Ok(result)
    }

    fn analyze(&self, series: &PriceSeries, window: &ScanWindow, sampler: &SamplerConfig) -> WindowOutcome {
        let sampler = sampler.with_seed_offset(window.index as u64);

        match self
            .model
            .analyze_event(series, window.center(), self.config.window_size_days, &sampler)
        {
            Ok((_, verdict)) => self.judge(verdict, window.start, window.end),
            Err(e) => {
                error!("Window {} to {} failed: {}", window.start, window.end, e);
                WindowOutcome::Failed
            }
        }
    }

    fn judge(
        &self,
        verdict: WindowVerdict,
        start: NaiveDate,
        end: NaiveDate,
    ) -> WindowOutcome {
        match verdict {
            WindowVerdict::InsufficientData { observations } => {
                debug!("Window {} to {}: only {} observations", start, end, observations);
                WindowOutcome::InsufficientData
            }
            WindowVerdict::LowVolatilityRatio { estimate } => {
                debug!(
                    "Window {} to {}: vol ratio too low ({:.2}x)",
                    start, end, estimate.volatility_ratio
                );
                WindowOutcome::LowVolatilityRatio
            }
            // gate on the confidence as it will be stored
            WindowVerdict::Detected(estimate)
                if round_to(estimate.confidence, CONFIDENCE_DECIMALS) < self.config.min_confidence =>
            {
                debug!(
                    "Window {} to {}: confidence {:.3} below threshold",
                    start, end, estimate.confidence
                );
                WindowOutcome::LowConfidence
            }
            WindowVerdict::Detected(estimate) => {
                info!(
                    "Window {} to {}: crisis {} to {} detected, confidence {:.3}",
                    start, end, estimate.crisis_start_date, estimate.crisis_end_date, estimate.confidence
                );
                WindowOutcome::Accepted(Candidate::from_estimate(
                    &estimate,
                    start,
                    end,
                    self.config.window_size_days,
                ))
            }
        }
    }

    /// Analyze only the most recent window and append any new detection.
    ///
    /// Falls back to a full scan when nothing has been stored yet.
    pub fn run_incremental(
        &self,
        series: &PriceSeries,
        store: &dyn CrisisStore,
        sampler: &SamplerConfig,
    ) -> ScanResult<Vec<ConsolidatedChangePoint>> {
        info!("Running incremental scan");

        let Some(last_end) = store.last_crisis_end()? else {
            info!("No previous scan found; running full scan");
            return self.run_full_scan(series, store, sampler);
        };
        let Some(last_date) = series.last_date() else {
            return Err(ScanError::NoData);
        };

        let tail_start = last_end - Duration::days(self.config.window_size_days);
        let tail = series.tail_from(tail_start);
        if tail.len() < self.model.config().min_observations {
            info!("Insufficient new data since {} ({} observations)", last_end, tail.len());
            return Ok(Vec::new());
        }
        info!("Analyzing data from {} onwards", tail_start);

        let center = last_date - Duration::days(self.config.window_size_days / 2);
        let sampler = sampler.with_seed_offset(0);

        let (window, verdict) = match self.model.analyze_event(
            series,
            center,
            self.config.window_size_days,
            &sampler,
        ) {
            Ok(result) => result,
            Err(e) => {
                error!("Incremental analysis failed: {}", e);
                return Ok(Vec::new());
            }
        };

        let (Some(first), Some(last)) = (window.first(), window.last()) else {
            return Ok(Vec::new());
        };
        let WindowOutcome::Accepted(candidate) = self.judge(verdict, first.date, last.date) else {
            info!("No new crisis detected");
            return Ok(Vec::new());
        };

        let record = ConsolidatedChangePoint::new(candidate, Utc::now());
        if record.start_date() <= last_end {
            warn!(
                "New detection starting {} overlaps stored crisis ending {}",
                record.start_date(),
                last_end
            );
        }
        store.append(std::slice::from_ref(&record))?;
        info!("New crisis detected in incremental scan");

        Ok(vec![record])
    }
}
