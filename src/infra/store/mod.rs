//! Assignment store backends.

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::InMemoryStore;

use chrono::NaiveDate;

/// Every date of the inclusive range.
pub(crate) fn days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}
