//! Database Connection and Setup
//!
//! Manages the SQLite connection and migrations.

use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Database state wrapper
pub struct DbState {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl DbState {
    /// Shared handle for repositories
    pub fn connection(&self) -> Arc<Mutex<Option<Connection>>> {
        self.conn.clone()
    }

    /// Drop the connection; repositories report "Database not initialized" afterwards
    #[cfg(test)]
    pub(crate) async fn close(&self) {
        self.conn.lock().await.take();
    }
}

/// Open (or create) the database at `db_path`; `:memory:` works for tests
pub fn init_db(db_path: &Path) -> Result<DbState, String> {
    let conn = Connection::open(db_path)
        .map_err(|e| format!("Failed to open db {}: {}", db_path.display(), e))?;

    run_migrations(&conn)?;

    Ok(DbState {
        conn: Arc::new(Mutex::new(Some(conn))),
    })
}

/// Run database migrations
fn run_migrations(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS itinerary_items (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            item_key TEXT NOT NULL,
            item_type TEXT NOT NULL,
            item_id TEXT NOT NULL,
            item_data TEXT NOT NULL DEFAULT '{}',
            date TEXT,
            time TEXT,
            notes TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            UNIQUE(user_id, item_type, item_id)
        );
        CREATE INDEX IF NOT EXISTS idx_itinerary_user_key ON itinerary_items(user_id, item_key);",
    )
    .map_err(|e| format!("Failed to migrate itinerary_items: {}", e))?;

    Ok(())
}
