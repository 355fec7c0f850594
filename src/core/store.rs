//! Persistence contract for assignment rows.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::core::model::Assignment;
use crate::core::PlanningError;

/// Tabular store of assignment rows, one row per [`Assignment`].
///
/// `replace_range` is a full delete-then-insert over the inclusive date range:
/// the last full-range write wins, nothing is merged.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Delete every row dated within `[start, end]`, then insert `rows`.
    async fn replace_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        rows: Vec<Assignment>,
    ) -> Result<(), PlanningError>;

    /// Rows dated within `[start, end]`.
    async fn list_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Assignment>, PlanningError>;

    /// Time of the last write touching `[start, end]`, in ms since epoch.
    ///
    /// Stores without change tracking return `None`; callers then compare rows.
    async fn last_modified(
        &self,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Option<u128>, PlanningError> {
        Ok(None)
    }
}
