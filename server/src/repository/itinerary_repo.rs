//! Itinerary Repository Implementation
//!
//! SQLite-backed implementation of ItineraryRepository

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::traits::ItineraryRepository;
use crate::domain::{DomainError, DomainResult, EntryPatch, ItemKind, ItineraryEntry, ItineraryStats, NewEntry};

const COLUMNS: &str =
    "row_id, item_key, user_id, item_type, item_id, item_data, date, time, notes, created_at";

pub struct SqliteItineraryRepository {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteItineraryRepository {
    pub fn new(conn: Arc<Mutex<Option<Connection>>>) -> Self {
        Self { conn }
    }
}

fn not_initialized() -> DomainError {
    DomainError::Internal("Database not initialized".to_string())
}

fn select_by_key(conn: &Connection, user_id: &str, item_key: &str) -> DomainResult<Option<ItineraryEntry>> {
    let sql = format!("SELECT {} FROM itinerary_items WHERE user_id = ? AND item_key = ?", COLUMNS);
    let entry = conn
        .query_row(&sql, params![user_id, item_key], row_to_entry)
        .optional()?;
    Ok(entry)
}

#[async_trait]
impl ItineraryRepository for SqliteItineraryRepository {
    async fn create(&self, entry: &NewEntry) -> DomainResult<ItineraryEntry> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let key = entry.key();
        let created_at = Utc::now();
        let item_data = serde_json::to_string(&entry.item_data)
            .map_err(|e| DomainError::InvalidInput(format!("itemData is not serializable: {}", e)))?;

        let inserted = conn.execute(
            "INSERT INTO itinerary_items (user_id, item_key, item_type, item_id, item_data, date, time, notes, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.user_id,
                key,
                entry.item_type.as_str(),
                entry.item_id,
                item_data,
                entry.date.map(format_date),
                entry.time.map(format_time),
                entry.notes,
                created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                return Err(DomainError::Conflict(format!("Item {} already exists", key)));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(ItineraryEntry {
            row_id: conn.last_insert_rowid(),
            item_key: key,
            user_id: entry.user_id.clone(),
            item_type: entry.item_type,
            item_id: entry.item_id.clone(),
            item_data: entry.item_data.clone(),
            date: entry.date,
            time: entry.time,
            notes: entry.notes.clone(),
            created_at,
        })
    }

    async fn find_by_key(&self, user_id: &str, item_key: &str) -> DomainResult<Option<ItineraryEntry>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        select_by_key(conn, user_id, item_key)
    }

    async fn list_by_user(&self, user_id: &str) -> DomainResult<Vec<ItineraryEntry>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let sql = format!(
            "SELECT {} FROM itinerary_items WHERE user_id = ? ORDER BY created_at ASC, row_id ASC",
            COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![user_id], row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    async fn exists(&self, user_id: &str, kind: ItemKind, item_id: &str) -> DomainResult<bool> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let found = conn
            .query_row(
                "SELECT 1 FROM itinerary_items WHERE user_id = ? AND item_type = ? AND item_id = ?",
                params![user_id, kind.as_str(), item_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn update(&self, user_id: &str, item_key: &str, patch: &EntryPatch) -> DomainResult<ItineraryEntry> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let mut entry = select_by_key(conn, user_id, item_key)?
            .ok_or_else(|| DomainError::NotFound(format!("Item {}", item_key)))?;
        if patch.is_empty() {
            return Ok(entry);
        }

        if let Some(date) = patch.date {
            entry.date = date;
        }
        if let Some(time) = patch.time {
            entry.time = time;
        }
        if let Some(notes) = &patch.notes {
            entry.notes = notes.clone();
        }

        conn.execute(
            "UPDATE itinerary_items SET date = ?, time = ?, notes = ? WHERE row_id = ?",
            params![
                entry.date.map(format_date),
                entry.time.map(format_time),
                entry.notes,
                entry.row_id
            ],
        )?;

        Ok(entry)
    }

    async fn delete(&self, user_id: &str, item_key: &str) -> DomainResult<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let removed = conn.execute(
            "DELETE FROM itinerary_items WHERE user_id = ? AND item_key = ?",
            params![user_id, item_key],
        )?;
        if removed == 0 {
            return Err(DomainError::NotFound(format!("Item {}", item_key)));
        }
        Ok(())
    }

    async fn delete_by_user(&self, user_id: &str) -> DomainResult<usize> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let removed = conn.execute("DELETE FROM itinerary_items WHERE user_id = ?", params![user_id])?;
        Ok(removed)
    }

    async fn stats_by_user(&self, user_id: &str) -> DomainResult<ItineraryStats> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let mut stmt = conn.prepare(
            "SELECT item_type, COUNT(*) FROM itinerary_items WHERE user_id = ? GROUP BY item_type",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stats = ItineraryStats::default();
        for (kind, count) in rows {
            // Rows only ever hold validated kinds
            if let Ok(kind) = ItemKind::parse(&kind) {
                stats.record(kind, count.max(0) as usize);
            }
        }
        Ok(stats)
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

fn conversion_error(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Convert a database row to an ItineraryEntry
fn row_to_entry(row: &Row) -> rusqlite::Result<ItineraryEntry> {
    let item_type: String = row.get(3)?;
    let item_type = ItemKind::parse(&item_type).map_err(|e| conversion_error(3, e))?;

    let item_data: String = row.get(5)?;
    let item_data: Value = serde_json::from_str(&item_data).map_err(|e| conversion_error(5, e))?;

    let date = row
        .get::<_, Option<String>>(6)?
        .map(|raw| NaiveDate::parse_from_str(&raw, "%Y-%m-%d"))
        .transpose()
        .map_err(|e| conversion_error(6, e))?;

    let time = row
        .get::<_, Option<String>>(7)?
        .map(|raw| NaiveTime::parse_from_str(&raw, "%H:%M"))
        .transpose()
        .map_err(|e| conversion_error(7, e))?;

    let created_at: String = row.get(9)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| conversion_error(9, e))?
        .with_timezone(&Utc);

    Ok(ItineraryEntry {
        row_id: row.get(0)?,
        item_key: row.get(1)?,
        user_id: row.get(2)?,
        item_type,
        item_id: row.get(4)?,
        item_data,
        date,
        time,
        notes: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        created_at,
    })
}
