//! Storage of daily regime assignments, keyed by date.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDate;
use tracing::info;

use super::file::{read_records, write_records};
use super::{StoreError, StoreResult};
use crate::regime::RegimeDay;

/// Persistence boundary for regime days. Dates are unique.
pub trait RegimeStore: Send + Sync {
    /// Every stored day in date order.
    fn load_all(&self) -> StoreResult<Vec<RegimeDay>>;

    /// Replace every stored day.
    fn replace_all(&self, days: &[RegimeDay]) -> StoreResult<()>;

    /// Delete the stored days with the given dates, then insert `days`.
    fn upsert(&self, days: &[RegimeDay]) -> StoreResult<()>;
}

/// Merge `days` into `existing`, replacing same-date entries.
fn merge(existing: Vec<RegimeDay>, days: &[RegimeDay]) -> Vec<RegimeDay> {
    let replaced: HashSet<NaiveDate> = days.iter().map(|d| d.date).collect();
    let mut by_date: BTreeMap<NaiveDate, RegimeDay> = existing
        .into_iter()
        .filter(|d| !replaced.contains(&d.date))
        .map(|d| (d.date, d))
        .collect();
    for day in days {
        by_date.insert(day.date, day.clone());
    }
    by_date.into_values().collect()
}

/// Deduplicated by date, last entry wins, in date order.
fn normalize(days: &[RegimeDay]) -> Vec<RegimeDay> {
    merge(Vec::new(), days)
}

/// In-memory regime store.
#[derive(Debug, Default)]
pub struct MemoryRegimeStore {
    days: Mutex<Vec<RegimeDay>>,
}

impl MemoryRegimeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Vec<RegimeDay>>> {
        self.days.lock().map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl RegimeStore for MemoryRegimeStore {
    fn load_all(&self) -> StoreResult<Vec<RegimeDay>> {
        Ok(self.lock()?.clone())
    }

    fn replace_all(&self, days: &[RegimeDay]) -> StoreResult<()> {
        *self.lock()? = normalize(days);
        Ok(())
    }

    fn upsert(&self, days: &[RegimeDay]) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let existing = std::mem::take(&mut *guard);
        *guard = merge(existing, days);
        Ok(())
    }
}

/// Regime store backed by a JSON file.
#[derive(Debug)]
pub struct JsonRegimeStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonRegimeStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }
}

impl RegimeStore for JsonRegimeStore {
    fn load_all(&self) -> StoreResult<Vec<RegimeDay>> {
        read_records(&self.path)
    }

    fn replace_all(&self, days: &[RegimeDay]) -> StoreResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        let days = normalize(days);
        write_records(&self.path, &days)?;
        info!("Saved {} regime days to {}", days.len(), self.path.display());
        Ok(())
    }

    fn upsert(&self, days: &[RegimeDay]) -> StoreResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        let merged = merge(read_records(&self.path)?, days);
        write_records(&self.path, &merged)?;
        info!("Updated {} regime days in {}", days.len(), self.path.display());
        Ok(())
    }
}
