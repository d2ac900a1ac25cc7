//! JSON file helpers shared by the file-backed stores.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::StoreResult;

/// Read a JSON array, treating a missing file as empty.
pub(crate) fn read_records<T: DeserializeOwned>(path: &Path) -> StoreResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&content)?)
}

/// Write a JSON array through a temporary sibling file and rename it into place.
///
/// Readers see either the previous contents or the new ones, never a partial file.
pub(crate) fn write_records<T: Serialize>(path: &Path, records: &[T]) -> StoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    fs::write(tmp, serde_json::to_vec_pretty(records)?)?;
    fs::rename(tmp, path)?;
    Ok(())
}
