//! Section storage: in-memory ownership and SQLite persistence.

pub mod position;
#[cfg(feature = "sqlite")]
pub mod sqlite;
