use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use thiserror::Error;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to acquire database lock")]
    Lock,

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt stored record: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared handle to the SQLite database.
///
/// Domain modules hang their schema and queries off this type in their
/// own `impl Database` blocks (see `monitor::storage`).
#[derive(Clone)]
pub struct Database {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at the default per-user data path.
    pub fn new() -> Result<Self, DbError> {
        let dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gridwatch");
        std::fs::create_dir_all(&dir)?;
        Self::open(dir.join("gridwatch.db"))
    }

    /// Open (or create) the database at a specific path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}
