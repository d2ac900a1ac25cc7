pub mod config;
pub mod consolidation;
pub mod data;
pub mod model;
pub mod pipeline;
pub mod regime;
pub mod scanner;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use config::{ConfigError, PipelineConfig};
pub use consolidation::{ConsolidatedChangePoint, Consolidator};
pub use data::{DataLoader, GroundTruthEvent, Observation, PriceSeries};
pub use model::{Candidate, ChangePointModel, GridPosteriorEngine, InferenceEngine, SamplerConfig};
pub use pipeline::{Pipeline, PipelineError};
pub use regime::{Regime, RegimeDay, RegimeLabeler, RegimeReport};
pub use scanner::{ScannerConfig, WindowScanner};
pub use store::{
    CrisisStore, JsonCrisisStore, JsonRegimeStore, MemoryCrisisStore, MemoryRegimeStore,
    RegimeStore,
};
pub use validation::{DataQualityValidator, GroundTruthValidator, ValidationResult};
