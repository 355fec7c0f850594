//! In-memory assignment store for development and testing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;

use super::days;
use crate::core::{Assignment, AssignmentStore, PlanningError};
use crate::util::clock::now_ms;

#[derive(Debug, Default)]
struct Day {
    rows: Vec<Assignment>,
    modified_ms: u128,
}

/// Store keeping rows per date behind a mutex.
///
/// Can be switched offline to exercise persistence failures.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    days: Mutex<BTreeMap<NaiveDate, Day>>,
    offline: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every call with a persistence failure while `offline` is set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }

    /// Number of successful `replace_range` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Acquire)
    }

    fn ensure_online(&self) -> Result<(), PlanningError> {
        if self.offline.load(Ordering::Acquire) {
            return Err(PlanningError::PersistenceFailure("store unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AssignmentStore for InMemoryStore {
    async fn replace_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        rows: Vec<Assignment>,
    ) -> Result<(), PlanningError> {
        self.ensure_online()?;
        if let Some(row) = rows.iter().find(|r| r.date < start || r.date > end) {
            return Err(PlanningError::PersistenceFailure(format!(
                "row dated {} outside {start}..={end}",
                row.date
            )));
        }
        let stamp = now_ms();
        let mut stored = self.days.lock();
        for date in days(start, end) {
            let day = stored.entry(date).or_default();
            day.rows.clear();
            day.modified_ms = stamp;
        }
        for row in rows {
            stored.entry(row.date).or_default().rows.push(row);
        }
        drop(stored);
        self.writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn list_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Assignment>, PlanningError> {
        self.ensure_online()?;
        let stored = self.days.lock();
        Ok(stored
            .range(start..=end)
            .flat_map(|(_, day)| day.rows.iter().cloned())
            .collect())
    }

    async fn last_modified(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<u128>, PlanningError> {
        self.ensure_online()?;
        let stored = self.days.lock();
        Ok(stored.range(start..=end).map(|(_, day)| day.modified_ms).max())
    }
}
