//! Pipeline runner.
//!
//! A full run rescans the history (or reuses the stored crises), relabels
//! every day, validates against ground truth and reports. An incremental run
//! scans only the newest window and rewrites just the days whose label moved.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, PipelineConfig};
use crate::consolidation::{ConsolidatedChangePoint, Consolidator};
use crate::data::{GroundTruthEvent, LoaderError, PriceSeries};
use crate::model::{
    ChangePointModel, InferenceEngine, InferenceError, SamplerConfig, SingleBreakEstimate,
};
use crate::regime::{changed_days, RegimeDay, RegimeLabeler, RegimeReport};
use crate::scanner::{ScanError, WindowScanner};
use crate::store::{CrisisStore, RegimeStore, StoreError};
use crate::validation::{DataQualityValidator, GroundTruthValidator, ValidationResult};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Outcome of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct FullRunSummary {
    pub crises: Vec<ConsolidatedChangePoint>,
    /// False when the stored crises were reused.
    pub detection_ran: bool,
    pub labeled_days: usize,
    pub report: RegimeReport,
    pub validation: ValidationResult,
}

impl FullRunSummary {
    pub fn average_confidence(&self) -> Option<f64> {
        if self.crises.is_empty() {
            return None;
        }
        let total: f64 = self.crises.iter().map(|c| c.confidence()).sum();
        Some(total / self.crises.len() as f64)
    }

    pub fn log(&self) {
        info!("Pipeline summary");
        info!("  Crises: {}", self.crises.len());
        if let Some(avg) = self.average_confidence() {
            info!("  Average confidence: {:.3}", avg);
        }
        info!("  Days labeled: {}", self.labeled_days);
        for (regime, count) in &self.report.distribution {
            let pct = if self.report.total_days > 0 {
                *count as f64 / self.report.total_days as f64 * 100.0
            } else {
                0.0
            };
            info!("    {}: {} days ({:.1}%)", regime, count, pct);
        }
        if self.validation.total_known_events > 0 {
            info!("  Detection rate: {:.1}%", self.validation.detection_rate);
            info!("  False positive rate: {:.1}%", self.validation.false_positive_rate);
        }
    }
}

/// Outcome of an incremental run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IncrementalSummary {
    pub new_crises: Vec<ConsolidatedChangePoint>,
    /// Days rewritten in the regime store.
    pub updated_days: usize,
}

/// Wires the scanner, labeler and validator to a pair of stores.
pub struct Pipeline<E> {
    scanner: WindowScanner<E>,
    labeler: RegimeLabeler,
    validator: GroundTruthValidator,
    sampler: SamplerConfig,
    incremental_sampler: SamplerConfig,
    crises: Box<dyn CrisisStore>,
    regimes: Box<dyn RegimeStore>,
}

impl<E: InferenceEngine> Pipeline<E> {
    pub fn new(
        engine: E,
        config: &PipelineConfig,
        crises: Box<dyn CrisisStore>,
        regimes: Box<dyn RegimeStore>,
    ) -> PipelineResult<Self> {
        config.validate()?;

        let model = ChangePointModel::with_config(engine, config.model.clone());
        let scanner = WindowScanner::new(model, config.scanner.clone())
            .with_quality_validator(DataQualityValidator::new(config.data_quality.clone()))
            .with_consolidator(Consolidator::new(config.consolidation.clone()));

        info!(
            "Pipeline configured: window {} days, step {} days, min confidence {}",
            config.scanner.window_size_days,
            config.scanner.step_size_days,
            config.scanner.min_confidence
        );

        Ok(Self {
            scanner,
            labeler: RegimeLabeler::new(config.labeler.clone()),
            validator: GroundTruthValidator::new(config.validation.clone()),
            sampler: config.sampler.clone(),
            incremental_sampler: config.incremental_sampler.clone(),
            crises,
            regimes,
        })
    }

    pub fn crisis_store(&self) -> &dyn CrisisStore {
        self.crises.as_ref()
    }

    pub fn regime_store(&self) -> &dyn RegimeStore {
        self.regimes.as_ref()
    }

    /// Full scan, replacing the stored crises.
    pub fn detect(&self, series: &PriceSeries) -> PipelineResult<Vec<ConsolidatedChangePoint>> {
        Ok(self
            .scanner
            .run_full_scan(series, self.crises.as_ref(), &self.sampler)?)
    }

    /// Relabel every observation from the stored crises and replace the
    /// regime store.
    pub fn label(&self, series: &PriceSeries) -> PipelineResult<Vec<RegimeDay>> {
        let crises = self.crises.load_all()?;
        let days = self.labeler.assign_regimes(series.observations(), &crises);
        self.regimes.replace_all(&days)?;
        info!("Stored {} regime days", days.len());
        RegimeReport::from_days(&days).log();
        Ok(days)
    }

    /// Single-break analysis of the scan-sized window centered on `date`.
    ///
    /// `None` when the window holds too few observations.
    pub fn analyze_date(
        &self,
        series: &PriceSeries,
        date: NaiveDate,
    ) -> PipelineResult<Option<SingleBreakEstimate>> {
        let window_size_days = self.scanner.config().window_size_days;
        let estimate = self.scanner.model().analyze_single_break(
            series,
            date,
            window_size_days,
            &self.sampler,
        )?;
        match &estimate {
            Some(e) => info!(
                "Break around {}: {} (volatility {:.4} -> {:.4}, {:+.2}%, confidence {:.3})",
                date,
                e.breakpoint_date,
                e.volatility_before,
                e.volatility_after,
                e.volatility_change_pct,
                e.confidence
            ),
            None => warn!("Not enough observations around {}", date),
        }
        Ok(estimate)
    }

    /// Score the stored crises against `events`.
    pub fn validate(&self, events: &[GroundTruthEvent]) -> PipelineResult<ValidationResult> {
        let crises = self.crises.load_all()?;
        Ok(self.validator.validate(&crises, events))
    }

    /// Report over the stored regime days.
    pub fn report(&self) -> PipelineResult<RegimeReport> {
        let days = self.regimes.load_all()?;
        Ok(RegimeReport::from_days(&days))
    }

    pub fn run_full(
        &self,
        series: &PriceSeries,
        events: &[GroundTruthEvent],
        skip_detection: bool,
    ) -> PipelineResult<FullRunSummary> {
        info!("Phase 1: change point detection");
        let crises = if skip_detection {
            let stored = self.crises.load_all()?;
            info!("Skipping detection; loaded {} stored crises", stored.len());
            stored
        } else {
            let detected = self.detect(series)?;
            if detected.is_empty() {
                warn!("No crises detected");
            }
            detected
        };

        info!("Phase 2: regime labeling");
        let days = self.label(series)?;
        let report = RegimeReport::from_days(&days);

        info!("Phase 3: validation");
        let validation = self.validator.validate(&crises, events);

        let summary = FullRunSummary {
            crises,
            detection_ran: !skip_detection,
            labeled_days: days.len(),
            report,
            validation,
        };
        summary.log();
        Ok(summary)
    }

    /// Scan the newest window; relabel only when a crisis was added.
    pub fn run_incremental(&self, series: &PriceSeries) -> PipelineResult<IncrementalSummary> {
        let new_crises =
            self.scanner
                .run_incremental(series, self.crises.as_ref(), &self.incremental_sampler)?;

        if new_crises.is_empty() {
            info!("No new crises; regime labels unchanged");
            return Ok(IncrementalSummary::default());
        }
        info!("Detected {} new crises", new_crises.len());

        let crises = self.crises.load_all()?;
        let current = self.labeler.assign_regimes(series.observations(), &crises);
        let previous = self.regimes.load_all()?;
        let changed = changed_days(&previous, &current);
        self.regimes.upsert(&changed)?;
        info!("Updated {} regime days", changed.len());

        Ok(IncrementalSummary {
            new_crises,
            updated_days: changed.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::posterior::{SIGMA_1, SIGMA_2, SIGMA_3, TAU, TAU_1, TAU_2};
    use crate::model::{InferenceResult, ModelSpec, ModelVariant, PosteriorSamples};
    use crate::regime::Regime;
    use crate::store::{MemoryCrisisStore, MemoryRegimeStore};
    use chrono::{Duration, NaiveDate};
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;

    struct QuarterEngine;

    impl InferenceEngine for QuarterEngine {
        fn infer(&self, returns: &[f64], spec: &ModelSpec) -> InferenceResult<PosteriorSamples> {
            let n = returns.len();
            if spec.variant == ModelVariant::SingleBreak {
                return Ok(PosteriorSamples::new()
                    .with_discrete(TAU, vec![n / 2])
                    .with_continuous(SIGMA_1, vec![0.01])
                    .with_continuous(SIGMA_2, vec![0.02]));
            }
            Ok(PosteriorSamples::new()
                .with_discrete(TAU_1, vec![n / 4])
                .with_discrete(TAU_2, vec![3 * n / 4])
                .with_continuous(SIGMA_1, vec![0.01])
                .with_continuous(SIGMA_2, vec![0.04])
                .with_continuous(SIGMA_3, vec![0.015]))
        }
    }

    fn series(days: i64) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
        let prices = (0..days)
            .map(|i| {
                let price = 70.0 + (i as f64 * 0.3).sin();
                (start + Duration::days(i), Decimal::from_f64(price).unwrap())
            })
            .collect();
        PriceSeries::from_prices(prices).unwrap()
    }

    fn pipeline() -> Pipeline<QuarterEngine> {
        Pipeline::new(
            QuarterEngine,
            &PipelineConfig::default(),
            Box::new(MemoryCrisisStore::new()),
            Box::new(MemoryRegimeStore::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = PipelineConfig::default();
        config.scanner.step_size_days = 0;
        let result = Pipeline::new(
            QuarterEngine,
            &config,
            Box::new(MemoryCrisisStore::new()),
            Box::new(MemoryRegimeStore::new()),
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_full_run_labels_every_day() {
        let pipeline = pipeline();
        let data = series(1200);
        let summary = pipeline.run_full(&data, &[], false).unwrap();

        assert!(summary.detection_ran);
        assert!(!summary.crises.is_empty());
        assert_eq!(summary.labeled_days, data.len());
        assert_eq!(pipeline.regime_store().load_all().unwrap().len(), data.len());
        assert!(summary.report.days_in(Regime::Crisis) > 0);
        assert_eq!(summary.crises.len(), pipeline.crisis_store().load_all().unwrap().len());
    }

    #[test]
    fn test_skip_detection_reuses_stored_crises() {
        let pipeline = pipeline();
        let data = series(1200);
        let first = pipeline.run_full(&data, &[], false).unwrap();

        let second = pipeline.run_full(&data, &[], true).unwrap();
        assert!(!second.detection_ran);
        assert_eq!(second.crises, first.crises);
        assert_eq!(second.report, first.report);
    }

    #[test]
    fn test_incremental_writes_only_changed_days() {
        let pipeline = pipeline();
        let data = series(1200);
        pipeline.run_full(&data, &[], false).unwrap();
        let before = pipeline.regime_store().load_all().unwrap();

        let summary = pipeline.run_incremental(&data).unwrap();
        assert_eq!(summary.new_crises.len(), 1);
        assert!(summary.updated_days <= before.len());

        let after = pipeline.regime_store().load_all().unwrap();
        assert_eq!(after.len(), before.len());
        let crises = pipeline.crisis_store().load_all().unwrap();
        let relabeled = RegimeLabeler::default().assign_regimes(data.observations(), &crises);
        assert_eq!(after, relabeled);
    }

    #[test]
    fn test_analyze_date_single_break() {
        let pipeline = pipeline();
        let data = series(1200);
        let center = NaiveDate::from_ymd_opt(2011, 7, 1).unwrap();

        let estimate = pipeline.analyze_date(&data, center).unwrap().unwrap();
        // 366 daily observations from center - 182 days; index 183 is the day after
        assert_eq!(estimate.tau, 183);
        assert_eq!(estimate.breakpoint_date, center + Duration::days(1));
        assert!((estimate.volatility_change_pct - 100.0).abs() < 1e-9);

        let before_data = NaiveDate::from_ymd_opt(2009, 6, 1).unwrap();
        assert!(pipeline.analyze_date(&data, before_data).unwrap().is_none());
    }

    #[test]
    fn test_report_empty_store() {
        let report = pipeline().report().unwrap();
        assert_eq!(report.total_days, 0);
    }
}
