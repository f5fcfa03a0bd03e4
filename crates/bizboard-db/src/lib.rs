pub mod businesses;
pub mod community;
pub mod migrations;
pub mod models;
pub mod users;

use anyhow::{Context, Result, anyhow, bail};
use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection factory for the store. It never holds a connection itself:
/// each invocation acquires its own [`Session`] and drops it when done.
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Resolve the connection string, make sure the schema is current and
    /// return the factory.
    pub fn open(url: &str) -> Result<Self> {
        let db = Self {
            path: store_path(url)?,
        };

        let session = db.acquire()?;
        migrations::run(session.connection())?;

        info!("Database ready at {}", db.path.display());
        Ok(db)
    }

    /// Open a fresh connection scoped to one invocation.
    pub fn acquire(&self) -> Result<Session> {
        let conn = Connection::open(&self.path)
            .with_context(|| format!("failed to open store at {}", self.path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        register_functions(&conn)?;

        debug!("Connection acquired");
        Ok(Session { conn })
    }
}

/// One open connection. Closed when dropped, whichever way the invocation ends.
pub struct Session {
    conn: Connection,
}

impl Session {
    /// Run one entity operation inside its own transaction. Commits when the
    /// closure returns `Ok`; any `Err` rolls everything back.
    pub fn unit<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, E>,
        E: From<rusqlite::Error>,
    {
        let tx = self.conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!("Connection released");
    }
}

/// `fold(text)` lowercases with full Unicode case mapping. SQLite's own
/// `lower()` and `LIKE` only fold ASCII.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "fold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|text| text.to_lowercase())),
    )?;
    Ok(())
}

/// Turn the configured connection string into a file path. Accepts a bare
/// path or one prefixed with `sqlite://` / `sqlite:`.
pub fn store_path(url: &str) -> Result<PathBuf> {
    let trimmed = url.trim();
    let path = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);

    if path.is_empty() {
        return Err(anyhow!("DATABASE_URL is empty"));
    }
    if path == ":memory:" {
        bail!("an in-memory store cannot be shared between invocations");
    }

    Ok(PathBuf::from(path))
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
