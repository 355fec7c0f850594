//! Infrastructure adapters for assignment storage.

pub mod store;

pub use store::{InMemoryStore, JsonFileStore};
