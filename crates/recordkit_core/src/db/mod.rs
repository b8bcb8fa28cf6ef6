//! SQLite storage bootstrap, schema migrations and the store executor seam.
//!
//! # Responsibility
//! - Open and configure SQLite connections for recordkit.
//! - Apply schema migrations in deterministic order.
//! - Define the `StoreExecutor` contract every repository talks to.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Repositories never touch a connection before migrations succeed.
//! - SQL handed to an executor uses positional `?` placeholders only.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod executor;
pub mod migrations;
mod open;

pub use executor::{ExecOutcome, StoreExecutor, StoreRow};
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// A returned row does not carry the expected column or value type.
    InvalidRow {
        column: String,
        message: String,
    },
    /// Failure reported by a non-SQLite executor implementation.
    Backend(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::InvalidRow { column, message } => {
                write!(f, "invalid value in column `{column}`: {message}")
            }
            Self::Backend(message) => write!(f, "store backend error: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::InvalidRow { .. } => None,
            Self::Backend(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
