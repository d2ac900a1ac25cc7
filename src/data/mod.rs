//! Time series source: daily prices, derived log-returns and ground-truth events.

pub mod loader;
pub mod types;

pub use loader::{parse_date, DataLoader, LoaderError};
pub use types::{log_returns, GroundTruthEvent, Observation, PriceSeries, SeriesError};
