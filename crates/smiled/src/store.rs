//! SQLite-backed slot store.
//!
//! One table, one row per named slot. The mirror only ever uses a single
//! slot (the compliment pool), but the schema does not care.

use rusqlite::{Connection, OptionalExtension};
use smile_core::store::{SlotStore, StoreError};
use std::path::Path;

pub struct SqliteSlotStore {
    conn: Connection,
}

impl SqliteSlotStore {
    /// Open (or create) the store at the given path, creating parent
    /// directories as needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("creating {}: {e}", parent.display())))?;
        }

        let conn = Connection::open(path).map_err(backend)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS slots (
                name  TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .map_err(backend)?;

        tracing::info!(path = %path.display(), "slot store opened");
        Ok(Self { conn })
    }
}

impl SlotStore for SqliteSlotStore {
    fn read(&self, slot: &str) -> Result<Option<String>, StoreError> {
        self.conn
            .query_row("SELECT value FROM slots WHERE name = ?1", [slot], |row| {
                row.get(0)
            })
            .optional()
            .map_err(backend)
    }

    fn write(&mut self, slot: &str, value: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO slots (name, value) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET value = excluded.value",
                [slot, value],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn delete(&mut self, slot: &str) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM slots WHERE name = ?1", [slot])
            .map_err(backend)?;
        Ok(())
    }
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}
