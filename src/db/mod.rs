//! Local persistence: a SQLite file holding string key-value pairs, with
//! an in-memory stand-in for tests.

pub mod kv;
pub mod sqlite;

pub use kv::*;
pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cannot prepare database location: {0}")]
    Io(#[from] std::io::Error),

    /// A stored or user-supplied string is not a known enum value.
    #[error("Unknown {field} value: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Schema migration v{version} failed: {reason}")]
    MigrationFailed { version: i64, reason: String },
}
