//! JSON file store: the whole table in one document, rewritten on every save.

use std::collections::BTreeMap;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::days;
use crate::core::{Assignment, AssignmentStore, PlanningError};
use crate::util::clock::now_ms;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredDay {
    modified_ms: u64,
    rows: Vec<Assignment>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    days: BTreeMap<NaiveDate, StoredDay>,
}

fn backend(e: impl std::fmt::Display) -> PlanningError {
    PlanningError::PersistenceFailure(e.to_string())
}

/// File-backed store. Several processes may share the file; the last write wins.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, PlanningError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent).map_err(backend)?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Document, PlanningError> {
        if !self.path.exists() {
            return Ok(Document::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(backend)?;
        if raw.trim().is_empty() {
            return Ok(Document::default());
        }
        serde_json::from_str(&raw).map_err(backend)
    }

    fn persist(&self, document: &Document) -> Result<(), PlanningError> {
        let tmp = self.path.with_extension("tmp");
        let raw = serde_json::to_string_pretty(document).map_err(backend)?;
        fs::write(&tmp, raw).map_err(backend)?;
        fs::rename(&tmp, &self.path).map_err(backend)
    }
}

#[async_trait]
impl AssignmentStore for JsonFileStore {
    async fn replace_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        rows: Vec<Assignment>,
    ) -> Result<(), PlanningError> {
        if let Some(row) = rows.iter().find(|r| r.date < start || r.date > end) {
            return Err(backend(format!(
                "row dated {} outside {start}..={end}",
                row.date
            )));
        }
        let _guard = self.write_lock.lock();
        let mut document = self.load()?;
        let stamp = u64::try_from(now_ms()).unwrap_or(u64::MAX);
        for date in days(start, end) {
            let day = document.days.entry(date).or_default();
            day.rows.clear();
            day.modified_ms = stamp;
        }
        for row in rows {
            document.days.entry(row.date).or_default().rows.push(row);
        }
        self.persist(&document)?;
        tracing::debug!(path = %self.path.display(), %start, %end, "range replaced");
        Ok(())
    }

    async fn list_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Assignment>, PlanningError> {
        let document = self.load()?;
        Ok(document
            .days
            .range(start..=end)
            .flat_map(|(_, day)| day.rows.iter().cloned())
            .collect())
    }

    async fn last_modified(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<u128>, PlanningError> {
        let document = self.load()?;
        Ok(document
            .days
            .range(start..=end)
            .map(|(_, day)| u128::from(day.modified_ms))
            .max())
    }
}
