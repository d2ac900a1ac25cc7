//! Persistence boundary for crisis records and regime days.
//!
//! Stores are traits so the pipeline can run against memory in tests and
//! JSON files from the command line.

pub mod crisis;
mod file;
pub mod regimes;

use thiserror::Error;

pub use crisis::{CrisisStore, JsonCrisisStore, MemoryCrisisStore};
pub use regimes::{JsonRegimeStore, MemoryRegimeStore, RegimeStore};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Store lock poisoned: {0}")]
    Lock(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
