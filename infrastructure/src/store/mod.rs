//! Persistence adapters

mod schema;
mod sqlite;

pub use sqlite::SqliteStore;
