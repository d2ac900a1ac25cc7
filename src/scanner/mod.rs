//! Sliding-window crisis scanning.
//!
//! Full scans walk the entire history:
//! - Window: 365 days
//! - Step: 90 days
//! - Acceptance: confidence >= 0.70 and crisis volatility >= 1.5x normal
//!
//! Incremental scans analyze only the most recent window.

pub mod detector;
pub mod windows;

pub use detector::{ScanError, ScanOutcome, ScanResult, ScanStats, ScannerConfig, WindowScanner};
pub use windows::{ScanWindow, SlidingWindows};
