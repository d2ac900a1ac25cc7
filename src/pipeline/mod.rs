//! End-to-end orchestration: detection, labeling, validation and reporting.

pub mod runner;

pub use runner::{FullRunSummary, IncrementalSummary, Pipeline, PipelineError, PipelineResult};
