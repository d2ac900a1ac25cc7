//! Storage of canonical crisis records.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDate;
use tracing::info;

use super::file::{read_records, write_records};
use super::{StoreError, StoreResult};
use crate::consolidation::ConsolidatedChangePoint;

/// Persistence boundary for canonical crisis records.
pub trait CrisisStore: Send + Sync {
    /// Every stored record.
    fn load_all(&self) -> StoreResult<Vec<ConsolidatedChangePoint>>;

    /// Atomically replace the stored set. An empty slice clears it.
    fn replace_all(&self, records: &[ConsolidatedChangePoint]) -> StoreResult<()>;

    /// Add records, keeping the existing ones.
    fn append(&self, records: &[ConsolidatedChangePoint]) -> StoreResult<()>;

    /// Latest crisis end date, `None` when nothing is stored.
    fn last_crisis_end(&self) -> StoreResult<Option<NaiveDate>> {
        Ok(self.load_all()?.iter().map(|r| r.end_date()).max())
    }
}

/// In-memory crisis store.
#[derive(Debug, Default)]
pub struct MemoryCrisisStore {
    records: Mutex<Vec<ConsolidatedChangePoint>>,
}

impl MemoryCrisisStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<ConsolidatedChangePoint>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Vec<ConsolidatedChangePoint>>> {
        self.records
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl CrisisStore for MemoryCrisisStore {
    fn load_all(&self) -> StoreResult<Vec<ConsolidatedChangePoint>> {
        Ok(self.lock()?.clone())
    }

    fn replace_all(&self, records: &[ConsolidatedChangePoint]) -> StoreResult<()> {
        *self.lock()? = records.to_vec();
        Ok(())
    }

    fn append(&self, records: &[ConsolidatedChangePoint]) -> StoreResult<()> {
        self.lock()?.extend_from_slice(records);
        Ok(())
    }
}

/// Crisis store backed by a JSON file.
#[derive(Debug)]
pub struct JsonCrisisStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonCrisisStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CrisisStore for JsonCrisisStore {
    fn load_all(&self) -> StoreResult<Vec<ConsolidatedChangePoint>> {
        read_records(&self.path)
    }

    fn replace_all(&self, records: &[ConsolidatedChangePoint]) -> StoreResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        write_records(&self.path, records)?;
        info!("Saved {} crisis records to {}", records.len(), self.path.display());
        Ok(())
    }

    fn append(&self, records: &[ConsolidatedChangePoint]) -> StoreResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        let mut all: Vec<ConsolidatedChangePoint> = read_records(&self.path)?;
        all.extend_from_slice(records);
        write_records(&self.path, &all)?;
        info!("Appended {} crisis records to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Candidate;
    use chrono::{TimeZone, Utc};

    fn record(start: (i32, u32, u32), end: (i32, u32, u32)) -> ConsolidatedChangePoint {
        ConsolidatedChangePoint::new(
            Candidate {
                crisis_start_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
                crisis_end_date: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
                volatility_pre: 0.01,
                volatility_crisis: 0.03,
                volatility_post: 0.012,
                detection_confidence: 0.82,
                window_size_days: 365,
                notes: "test".to_string(),
            },
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCrisisStore::new();
        assert_eq!(store.last_crisis_end().unwrap(), None);

        store.append(&[record((2008, 9, 1), (2009, 3, 1))]).unwrap();
        store.append(&[record((2020, 2, 20), (2020, 6, 1))]).unwrap();
        assert_eq!(store.load_all().unwrap().len(), 2);
        assert_eq!(
            store.last_crisis_end().unwrap(),
            NaiveDate::from_ymd_opt(2020, 6, 1)
        );

        store.replace_all(&[]).unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_json_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("crises.json");
        let store = JsonCrisisStore::new(&path);

        assert!(store.load_all().unwrap().is_empty());

        let first = record((2008, 9, 1), (2009, 3, 1));
        store.replace_all(&[first.clone()]).unwrap();
        store.append(&[record((2014, 7, 1), (2015, 2, 1))]).unwrap();

        let reopened = JsonCrisisStore::new(&path);
        let records = reopened.load_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], first);
        assert!(!dir.path().join("nested").join("crises.json.tmp").exists());

        reopened.replace_all(&[]).unwrap();
        assert!(reopened.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_json_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crises.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonCrisisStore::new(&path).load_all(),
            Err(StoreError::Serde(_))
        ));
    }
}
