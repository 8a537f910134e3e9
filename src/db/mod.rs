use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tokio::task;
use crate::error::{Result, FlowkgError};

pub mod migrate;
pub mod writer;

pub use writer::{import_corpus, ImportSummary, ObservedFlow};

/// Graph snapshot database wrapper
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
}

impl Db {
    /// Create a new database connection manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a read-write connection, creating the file if needed
    pub fn open_connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;

        // WAL lets readers keep a consistent snapshot while the importer rewrites tables
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA foreign_keys = ON; \
             PRAGMA temp_store = MEMORY;"
        )?;

        Ok(conn)
    }

    /// Open a connection to an existing database; never creates the file
    pub fn open_existing(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }

    /// Execute a closure with a read-write connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        task::spawn_blocking(move || {
            let mut conn = db.open_connection()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| FlowkgError::Io(std::io::Error::other(format!("blocking task failed: {}", e))))?
    }

    /// Execute a closure against an existing database in a blocking task
    pub async fn with_existing<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        task::spawn_blocking(move || {
            let conn = db.open_existing()?;
            f(&conn)
        })
        .await
        .map_err(|e| FlowkgError::Io(std::io::Error::other(format!("blocking task failed: {}", e))))?
    }
}
