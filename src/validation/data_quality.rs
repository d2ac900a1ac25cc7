//! Data quality checks run before any window is analyzed.
//!
//! Checks:
//! - Missing log-returns (critical)
//! - Non-finite log-returns (critical)
//! - Minimum series length (critical)
//! - Extreme outliers beyond N standard deviations (warning only, these are
//!   often the crises being looked for)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::{error, info, warn};

use crate::data::PriceSeries;

/// How a failed check affects the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Abort before any window is processed.
    Critical,
    /// Log and continue.
    Warning,
}

/// Result of a single quality check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub severity: Severity,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &str, severity: Severity, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            severity,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn fail(name: &str, severity: Severity, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            severity,
            message: message.to_string(),
            details,
        }
    }
}

/// Thresholds for the quality checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataQualityConfig {
    /// Minimum number of modeling observations.
    pub min_observations: usize,
    /// Outlier threshold in standard deviations from the mean.
    pub outlier_threshold_std: f64,
    /// Outlier dates included in the log.
    pub max_logged_outliers: usize,
}

impl Default for DataQualityConfig {
    fn default() -> Self {
        Self {
            min_observations: 100,
            outlier_threshold_std: 10.0,
            max_logged_outliers: 5,
        }
    }
}

/// Quality report for one series.
#[derive(Debug, Clone)]
pub struct DataQualityReport {
    pub observations: usize,
    pub checks: Vec<CheckResult>,
    pub outlier_dates: Vec<NaiveDate>,
}

impl DataQualityReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn has_critical_failure(&self) -> bool {
        self.checks
            .iter()
            .any(|c| !c.passed && c.severity == Severity::Critical)
    }

    pub fn critical_failures(&self) -> Vec<&CheckResult> {
        self.checks
            .iter()
            .filter(|c| !c.passed && c.severity == Severity::Critical)
            .collect()
    }

    pub fn warnings(&self) -> Vec<&CheckResult> {
        self.checks
            .iter()
            .filter(|c| !c.passed && c.severity == Severity::Warning)
            .collect()
    }

    pub fn summary(&self) -> String {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        format!(
            "{} observations: {}/{} checks passed ({} critical, {} warnings)",
            self.observations,
            passed,
            self.checks.len(),
            self.critical_failures().len(),
            self.warnings().len()
        )
    }
}

/// Validator for a price series.
pub struct DataQualityValidator {
    config: DataQualityConfig,
}

impl Default for DataQualityValidator {
    fn default() -> Self {
        Self::new(DataQualityConfig::default())
    }
}

impl DataQualityValidator {
    pub fn new(config: DataQualityConfig) -> Self {
        Self { config }
    }

    /// Run every check and log the outcome.
    pub fn validate(&self, series: &PriceSeries) -> DataQualityReport {
        let observations = series.modeling_observations();
        let returns: Vec<Option<f64>> = observations.iter().map(|o| o.log_return).collect();

        let mut checks = vec![
            self.check_missing(&returns),
            self.check_non_finite(&returns),
            self.check_length(observations.len()),
        ];

        let outlier_dates = self.find_outliers(series);
        checks.push(if outlier_dates.is_empty() {
            CheckResult::pass("extreme_outliers", Severity::Warning, "No extreme outliers")
        } else {
            CheckResult::fail(
                "extreme_outliers",
                Severity::Warning,
                &format!(
                    "{} extreme outliers detected (may be crisis events)",
                    outlier_dates.len()
                ),
                Some(format!(
                    "{:?}",
                    &outlier_dates[..outlier_dates.len().min(self.config.max_logged_outliers)]
                )),
            )
        });

        let report = DataQualityReport {
            observations: observations.len(),
            checks,
            outlier_dates,
        };
        log_report(&report);
        report
    }

    fn check_missing(&self, returns: &[Option<f64>]) -> CheckResult {
        let missing = returns.iter().filter(|r| r.is_none()).count();
        if missing == 0 {
            CheckResult::pass("missing_log_returns", Severity::Critical, "No missing log returns")
        } else {
            CheckResult::fail(
                "missing_log_returns",
                Severity::Critical,
                &format!("{} missing log returns", missing),
                None,
            )
        }
    }

    fn check_non_finite(&self, returns: &[Option<f64>]) -> CheckResult {
        let non_finite = returns
            .iter()
            .flatten()
            .filter(|r| !r.is_finite())
            .count();
        if non_finite == 0 {
            CheckResult::pass("finite_log_returns", Severity::Critical, "All log returns finite")
        } else {
            CheckResult::fail(
                "finite_log_returns",
                Severity::Critical,
                &format!("{} infinite log returns", non_finite),
                None,
            )
        }
    }

    fn check_length(&self, observations: usize) -> CheckResult {
        if observations >= self.config.min_observations {
            CheckResult::pass(
                "minimum_length",
                Severity::Critical,
                &format!("{} records", observations),
            )
        } else {
            CheckResult::fail(
                "minimum_length",
                Severity::Critical,
                &format!(
                    "Insufficient data: {} records (need at least {})",
                    observations, self.config.min_observations
                ),
                None,
            )
        }
    }

    /// Dates whose return deviates from the mean by more than the threshold.
    fn find_outliers(&self, series: &PriceSeries) -> Vec<NaiveDate> {
        let finite: Vec<f64> = series
            .log_returns()
            .into_iter()
            .filter(|r| r.is_finite())
            .collect();
        if finite.len() < 2 {
            return Vec::new();
        }

        let mean = finite.iter().mean();
        let std_dev = finite.iter().std_dev();
        let limit = self.config.outlier_threshold_std * std_dev;

        series
            .modeling_observations()
            .iter()
            .filter_map(|o| match o.log_return {
                Some(r) if r.is_finite() && (r - mean).abs() > limit => Some(o.date),
                _ => None,
            })
            .collect()
    }
}

fn log_report(report: &DataQualityReport) {
    if report.has_critical_failure() {
        error!("Critical data quality issues:");
        for check in report.critical_failures() {
            error!("  - {}", check.message);
        }
        return;
    }

    let warnings = report.warnings();
    if !warnings.is_empty() {
        warn!("Data quality warnings (non-critical):");
        for check in warnings {
            warn!("  - {}", check.message);
            if let Some(details) = &check.details {
                info!("    Dates: {}", details);
            }
        }
    }
    info!("Data quality checks passed: {}", report.summary());
}
