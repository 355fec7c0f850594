//! Tokio-driven synchronisation between a board and its store.

pub mod session;
pub mod sync;

pub use session::BoardSession;
pub use sync::{PollOutcome, SaveOutcome, SyncAdapter, SyncEvent};
