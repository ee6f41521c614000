//! Store backends: an in-memory map and a SQLite table.
//!
//! Both implement [`Store`] and pass the same contract tests.

pub mod in_memory;
pub mod sqlite;

pub use flatstruct_core_store::{Entity, Store, StoreError};

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;
