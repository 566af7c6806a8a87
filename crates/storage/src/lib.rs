//! Persistence layer for the Konsul reply engine.
//!
//! Implements the `konsul_core::store` traits twice: a production SQLite
//! backend and a mutex-guarded in-memory store for tests and the sandbox.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
