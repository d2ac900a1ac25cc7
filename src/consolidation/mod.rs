//! Consolidation of per-window detections into canonical crisis records.

pub mod consolidator;

pub use consolidator::{ConsolidatedChangePoint, Consolidator, ConsolidatorConfig};
