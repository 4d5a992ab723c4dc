//! `SQLite` presence store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, instrument};

use crate::error::{Result, StoreError};
use crate::schema;
use crate::store::PresenceStore;

/// `SQLite`-backed presence store.
///
/// rusqlite connections are blocking, so every call hops onto the blocking
/// pool and takes the connection mutex there.
pub struct SqlitePresenceStore {
    conn: Arc<Mutex<Option<Connection>>>,
    path: PathBuf,
}

impl SqlitePresenceStore {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("create dir: {e}")))?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        init_schema(&conn)?;

        info!(path = %path.display(), "presence database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path: path.to_owned(),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path: PathBuf::from(":memory:"),
        })
    }

    /// Database file path (`:memory:` for in-memory stores).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against the open connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<_> {
            let guard = conn.lock();
            let conn = guard.as_ref().ok_or(StoreError::Closed)?;
            f(conn)
        })
        .await?
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(schema::PRAGMAS)
        .map_err(|e| StoreError::Database(format!("pragmas: {e}")))?;
    conn.execute_batch(schema::CREATE_TABLES)
        .map_err(|e| StoreError::Database(format!("schema: {e}")))?;

    let version: Option<u32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    if version.is_none() {
        let _ = conn
            .execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [schema::SCHEMA_VERSION],
            )
            .map_err(|e| StoreError::Database(format!("schema version: {e}")))?;
    }
    Ok(())
}

#[async_trait]
impl PresenceStore for SqlitePresenceStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            let _: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    async fn add(&self, username: &str) -> Result<()> {
        let username = username.to_owned();
        self.with_conn(move |conn| {
            let _ = conn.execute(
                "INSERT INTO presence (username) VALUES (?1)",
                params![username],
            )?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    async fn remove(&self, username: &str) -> Result<bool> {
        let username = username.to_owned();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "DELETE FROM presence WHERE id = (
                     SELECT id FROM presence WHERE username = ?1 ORDER BY id LIMIT 1
                 )",
                params![username],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT username FROM presence ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let users = rows.collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
        .await
    }

    async fn disconnect(&self) -> Result<()> {
        let conn = self.conn.clone();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<_> {
            let Some(conn) = conn.lock().take() else {
                return Ok(());
            };
            conn.close()
                .map_err(|(_, e)| StoreError::Database(format!("close: {e}")))?;
            debug!(path = %path.display(), "presence database closed");
            Ok(())
        })
        .await?
    }
}
