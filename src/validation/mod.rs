//! Validation of inputs and outputs.
//!
//! - Data quality: checks on the price series before scanning
//! - Ground truth: scoring of detected crises against known events

pub mod data_quality;
pub mod ground_truth;

pub use data_quality::{
    CheckResult, DataQualityConfig, DataQualityReport, DataQualityValidator, Severity,
};
pub use ground_truth::{
    EventMatch, FalsePositive, GroundTruthValidator, ValidationConfig, ValidationResult,
    ValidationStatus,
};
