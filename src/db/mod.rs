//! SQLite-backed session store
//!
//! Persistence is best-effort: the runner logs a warning and keeps trading
//! when a write fails, so a broken disk never stops a paper session.

use rusqlite::{Connection, Result as SqlResult};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub mod session;
pub mod trade;

pub use session::SessionRecord;
pub use trade::FillRecord;

/// Database manager wrapping a single shared connection
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file
    pub fn new<P: AsRef<Path>>(path: P) -> SqlResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            // Ignore mkdir errors; the open below reports the real problem
            let _ = std::fs::create_dir_all(parent);
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing)
    pub fn new_in_memory() -> SqlResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run migrations to set up or update the schema
    pub fn run_migrations(&self) -> SqlResult<()> {
        let conn = self.conn.lock().unwrap();

        let migration_sql = include_str!("migrations/V1__initial_schema.sql");
        conn.execute_batch(migration_sql)?;

        Ok(())
    }

    /// Get a reference to the connection (for custom queries)
    pub fn get_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Check database health
    pub fn health_check(&self) -> SqlResult<bool> {
        let conn = self.conn.lock().unwrap();
        let result: i32 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
        Ok(result == 1)
    }
}
