//! Data loader for daily price series and ground-truth events.
//!
//! Reads CSV or Parquet files through polars. Header names vary between
//! exports (`Date` vs `date`, `Price` vs `close`), so columns are resolved
//! against a list of accepted aliases, case-insensitively.
//!
//! Price rows with a missing or non-numeric price are dropped. Rows are
//! sorted by date and duplicate dates are rejected.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use super::types::{GroundTruthEvent, PriceSeries, SeriesError};

/// Accepted header names for the observation date.
pub const DATE_COLUMNS: &[&str] = &["date", "trade_date", "timestamp"];

/// Accepted header names for the price.
pub const PRICE_COLUMNS: &[&str] = &["price", "close", "adj_close", "settle"];

/// Accepted header names for a ground-truth event date.
pub const EVENT_DATE_COLUMNS: &[&str] = &["event_date", "date"];

/// Accepted header names for a ground-truth event description.
pub const DESCRIPTION_COLUMNS: &[&str] = &["description", "event", "event_name"];

/// Date formats seen in exported price files ("2020-04-22", "20-May-87", "Apr 22, 2020").
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%b-%y", "%b %d, %Y", "%m/%d/%Y"];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Missing column: expected one of {0:?}")]
    MissingColumn(Vec<String>),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Series error: {0}")]
    Series(#[from] SeriesError),
}

/// Loader for price and event files under a data directory.
pub struct DataLoader {
    data_dir: String,
}

impl DataLoader {
    /// Create a new loader rooted at `data_dir`.
    pub fn new(data_dir: &str) -> Self {
        Self {
            data_dir: data_dir.to_string(),
        }
    }

    /// Resolve a file name against the data directory. Absolute paths pass through.
    fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.data_dir).join(path)
        }
    }

    /// Load a daily price series.
    pub fn load_prices(&self, file: &str) -> Result<PriceSeries, LoaderError> {
        let df = load_frame(&self.resolve(file))?;
        let date_col = resolve_column(&df, DATE_COLUMNS)?;
        let price_col = resolve_column(&df, PRICE_COLUMNS)?;

        let dates = df.column(&date_col)?.cast(&DataType::String)?;
        let prices = df.column(&price_col)?.cast(&DataType::Float64)?;

        let mut rows = Vec::with_capacity(df.height());
        let mut dropped = 0usize;

        for (raw_date, raw_price) in dates.str()?.into_iter().zip(prices.f64()?.into_iter()) {
            let (Some(raw_date), Some(raw_price)) = (raw_date, raw_price) else {
                dropped += 1;
                continue;
            };
            let date = parse_date(raw_date)
                .ok_or_else(|| LoaderError::InvalidData(format!("Unparseable date: {raw_date}")))?;
            match Decimal::from_f64(raw_price) {
                Some(price) => rows.push((date, price)),
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            warn!("Dropped {} rows with missing date or price", dropped);
        }

        rows.sort_by_key(|(date, _)| *date);
        if let Some(pair) = rows.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(LoaderError::InvalidData(format!(
                "Duplicate date in price file: {}",
                pair[0].0
            )));
        }

        let series = PriceSeries::from_prices(rows)?;
        if let (Some(first), Some(last)) = (series.observations().first(), series.last_date()) {
            info!(
                "Loaded {} price records ({} to {})",
                series.len(),
                first.date,
                last
            );
        }

        Ok(series)
    }

    /// Load curated ground-truth events, sorted by date.
    pub fn load_events(&self, file: &str) -> Result<Vec<GroundTruthEvent>, LoaderError> {
        let df = load_frame(&self.resolve(file))?;
        let date_col = resolve_column(&df, EVENT_DATE_COLUMNS)?;
        let description_col = resolve_column(&df, DESCRIPTION_COLUMNS).ok();

        let dates = df.column(&date_col)?.cast(&DataType::String)?;
        let descriptions = match &description_col {
            Some(name) => Some(df.column(name)?.cast(&DataType::String)?),
            None => None,
        };

        let mut events = Vec::with_capacity(df.height());
        for idx in 0..df.height() {
            let Some(raw_date) = dates.str()?.get(idx) else {
                continue;
            };
            let Some(event_date) = parse_date(raw_date) else {
                warn!("Skipping event with unparseable date: {}", raw_date);
                continue;
            };
            let description = match &descriptions {
                Some(col) => col.str()?.get(idx).unwrap_or_default().to_string(),
                None => String::new(),
            };
            events.push(GroundTruthEvent {
                event_date,
                description,
            });
        }

        events.sort_by_key(|e| e.event_date);
        info!("Loaded {} ground-truth events", events.len());
        Ok(events)
    }
}

/// Read a CSV or Parquet file into a DataFrame.
fn load_frame(path: &Path) -> Result<DataFrame, LoaderError> {
    if !path.exists() {
        return Err(LoaderError::FileNotFound(path.display().to_string()));
    }

    let lf = match path.extension().and_then(|ext| ext.to_str()) {
        Some("parquet") => LazyFrame::scan_parquet(path, ScanArgsParquet::default())?,
        _ => LazyCsvReader::new(path).with_has_header(true).finish()?,
    };

    Ok(lf.collect()?)
}

/// Find the first column whose name matches one of `candidates`, ignoring case.
fn resolve_column(df: &DataFrame, candidates: &[&str]) -> Result<String, LoaderError> {
    let columns: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    candidates
        .iter()
        .find_map(|candidate| {
            columns
                .iter()
                .find(|col| col.eq_ignore_ascii_case(candidate))
                .cloned()
        })
        .ok_or_else(|| {
            LoaderError::MissingColumn(candidates.iter().map(|s| s.to_string()).collect())
        })
}

/// Parse a date in any of the accepted export formats.
///
/// Datetime strings ("2020-01-02 00:00:00", "2020-01-02T00:00:00") keep only
/// their date part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            raw.get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        })
}
