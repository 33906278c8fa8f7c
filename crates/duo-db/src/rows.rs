use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use duo_types::Table;
use duo_types::models::{
    BucketItem, BucketPatch, ImportantDate, Message, MoodEntry, NewBucketItem, NewImportantDate,
    NewMessage, NewMoodEntry, NewPhoto, NewTask, Photo, Record, Task, TaskPatch,
};

use crate::Database;

/// A record type with a fixed SQL shape: the SELECT prefix, the stable list
/// order, and how to rebuild the record from a row in that column order.
pub trait Stored: Record {
    const SELECT: &'static str;
    const ORDER: &'static str;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

impl Database {
    pub fn list<R: Stored>(&self, couple_id: Uuid, limit: Option<u32>) -> Result<Vec<R>> {
        self.with_conn(|conn| select_rows(conn, couple_id, limit))
    }

    pub fn get<R: Stored>(&self, couple_id: Uuid, id: Uuid) -> Result<Option<R>> {
        self.with_conn(|conn| select_row(conn, couple_id, id))
    }

    /// Delete one row, scoped by couple. Returns whether a row was removed.
    pub fn delete_from(&self, table: Table, couple_id: Uuid, id: Uuid) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE couple_id = ?1 AND id = ?2", table.as_str());
        self.with_conn(|conn| {
            let removed = conn.execute(&sql, params![couple_id.to_string(), id.to_string()])?;
            Ok(removed > 0)
        })
    }

    // -- Tasks --

    pub fn insert_task(&self, couple_id: Uuid, draft: &NewTask) -> Result<Task> {
        let id = Uuid::new_v4();
        let now = timestamp(&Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, couple_id, title, completed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?4)",
                params![id.to_string(), couple_id.to_string(), draft.title, now],
            )?;
            fetch_inserted(conn, couple_id, id)
        })
    }

    pub fn update_task(&self, couple_id: Uuid, id: Uuid, patch: &TaskPatch) -> Result<Option<Task>> {
        let now = timestamp(&Utc::now());
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks
                 SET title = COALESCE(?3, title),
                     completed = COALESCE(?4, completed),
                     updated_at = ?5
                 WHERE couple_id = ?1 AND id = ?2",
                params![couple_id.to_string(), id.to_string(), patch.title, patch.completed, now],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            select_row(conn, couple_id, id)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, couple_id: Uuid, draft: &NewMessage) -> Result<Message> {
        let id = Uuid::new_v4();
        let now = timestamp(&Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, couple_id, content, sender_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.to_string(), couple_id.to_string(), draft.content, draft.sender_name, now],
            )?;
            fetch_inserted(conn, couple_id, id)
        })
    }

    // -- Moods --

    pub fn insert_mood(&self, couple_id: Uuid, draft: &NewMoodEntry) -> Result<MoodEntry> {
        let id = Uuid::new_v4();
        let now = timestamp(&Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO mood_entries (id, couple_id, partner_name, mood, note, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    couple_id.to_string(),
                    draft.partner_name,
                    draft.mood.as_str(),
                    draft.note,
                    now
                ],
            )?;
            fetch_inserted(conn, couple_id, id)
        })
    }

    // -- Bucket list --

    pub fn insert_bucket_item(&self, couple_id: Uuid, draft: &NewBucketItem) -> Result<BucketItem> {
        let id = Uuid::new_v4();
        let now = timestamp(&Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO bucket_list
                    (id, couple_id, title, category, priority, completed, notes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?7)",
                params![
                    id.to_string(),
                    couple_id.to_string(),
                    draft.title,
                    draft.category.as_str(),
                    draft.priority.as_str(),
                    draft.notes,
                    now
                ],
            )?;
            fetch_inserted(conn, couple_id, id)
        })
    }

    /// `completed_at` follows `completed`: stamped on the transition to true,
    /// cleared on the transition to false.
    pub fn update_bucket_item(
        &self,
        couple_id: Uuid,
        id: Uuid,
        patch: &BucketPatch,
    ) -> Result<Option<BucketItem>> {
        let now = timestamp(&Utc::now());
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE bucket_list
                 SET title = COALESCE(?3, title),
                     completed_at = CASE
                         WHEN ?4 IS NULL THEN completed_at
                         WHEN ?4 THEN COALESCE(completed_at, ?5)
                         ELSE NULL
                     END,
                     completed = COALESCE(?4, completed),
                     updated_at = ?5
                 WHERE couple_id = ?1 AND id = ?2",
                params![couple_id.to_string(), id.to_string(), patch.title, patch.completed, now],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            select_row(conn, couple_id, id)
        })
    }

    // -- Important dates --

    pub fn insert_important_date(
        &self,
        couple_id: Uuid,
        draft: &NewImportantDate,
    ) -> Result<ImportantDate> {
        let id = Uuid::new_v4();
        let now = timestamp(&Utc::now());
        let icon = draft.icon.as_deref().unwrap_or(duo_types::models::DEFAULT_DATE_ICON);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO important_dates
                    (id, couple_id, title, date, type, icon, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    id.to_string(),
                    couple_id.to_string(),
                    draft.title,
                    draft.date.to_string(),
                    draft.kind.as_str(),
                    icon,
                    draft.description,
                    now
                ],
            )?;
            fetch_inserted(conn, couple_id, id)
        })
    }

    // -- Photos --

    pub fn insert_photo(&self, couple_id: Uuid, draft: &NewPhoto) -> Result<Photo> {
        let id = Uuid::new_v4();
        let now = timestamp(&Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO photos (id, couple_id, url, caption, date_taken, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    id.to_string(),
                    couple_id.to_string(),
                    draft.url,
                    draft.caption,
                    draft.date_taken.map(|d| d.to_string()),
                    now
                ],
            )?;
            fetch_inserted(conn, couple_id, id)
        })
    }
}

fn select_rows<R: Stored>(conn: &Connection, couple_id: Uuid, limit: Option<u32>) -> Result<Vec<R>> {
    let sql = format!("{} WHERE couple_id = ?1 ORDER BY {} LIMIT ?2", R::SELECT, R::ORDER);
    let mut stmt = conn.prepare(&sql)?;

    // SQLite treats a negative LIMIT as "no limit"
    let limit = limit.map(i64::from).unwrap_or(-1);

    let rows = stmt
        .query_map(params![couple_id.to_string(), limit], R::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn select_row<R: Stored>(conn: &Connection, couple_id: Uuid, id: Uuid) -> Result<Option<R>> {
    let sql = format!("{} WHERE couple_id = ?1 AND id = ?2", R::SELECT);
    let row = conn
        .query_row(&sql, params![couple_id.to_string(), id.to_string()], R::from_row)
        .optional()?;
    Ok(row)
}

fn fetch_inserted<R: Stored>(conn: &Connection, couple_id: Uuid, id: Uuid) -> Result<R> {
    select_row(conn, couple_id, id)?.ok_or_else(|| anyhow!("row {} missing right after insert", id))
}

impl Stored for Task {
    const SELECT: &'static str =
        "SELECT id, couple_id, title, completed, created_at, updated_at FROM tasks";
    const ORDER: &'static str = "created_at DESC, rowid DESC";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Task {
            id: uuid_at(row, 0)?,
            couple_id: uuid_at(row, 1)?,
            title: row.get(2)?,
            completed: row.get(3)?,
            created_at: timestamp_at(row, 4)?,
            updated_at: timestamp_at(row, 5)?,
        })
    }
}

impl Stored for Message {
    const SELECT: &'static str =
        "SELECT id, couple_id, content, sender_name, created_at FROM messages";
    const ORDER: &'static str = "created_at DESC, rowid DESC";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Message {
            id: uuid_at(row, 0)?,
            couple_id: uuid_at(row, 1)?,
            content: row.get(2)?,
            sender_name: row.get(3)?,
            created_at: timestamp_at(row, 4)?,
        })
    }
}

impl Stored for MoodEntry {
    const SELECT: &'static str =
        "SELECT id, couple_id, partner_name, mood, note, created_at FROM mood_entries";
    const ORDER: &'static str = "created_at DESC, rowid DESC";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(MoodEntry {
            id: uuid_at(row, 0)?,
            couple_id: uuid_at(row, 1)?,
            partner_name: row.get(2)?,
            mood: enum_at(row, 3)?,
            note: row.get(4)?,
            created_at: timestamp_at(row, 5)?,
        })
    }
}

impl Stored for BucketItem {
    const SELECT: &'static str = "SELECT id, couple_id, title, category, priority, completed, notes,
                created_at, updated_at, completed_at FROM bucket_list";
    const ORDER: &'static str = "created_at DESC, rowid DESC";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(BucketItem {
            id: uuid_at(row, 0)?,
            couple_id: uuid_at(row, 1)?,
            title: row.get(2)?,
            category: enum_at(row, 3)?,
            priority: enum_at(row, 4)?,
            completed: row.get(5)?,
            notes: row.get(6)?,
            created_at: timestamp_at(row, 7)?,
            updated_at: timestamp_at(row, 8)?,
            completed_at: optional_timestamp_at(row, 9)?,
        })
    }
}

impl Stored for ImportantDate {
    const SELECT: &'static str = "SELECT id, couple_id, title, date, type, icon, description,
                created_at, updated_at FROM important_dates";
    const ORDER: &'static str = "date ASC, created_at ASC";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ImportantDate {
            id: uuid_at(row, 0)?,
            couple_id: uuid_at(row, 1)?,
            title: row.get(2)?,
            date: date_at(row, 3)?,
            kind: enum_at(row, 4)?,
            icon: row.get(5)?,
            description: row.get(6)?,
            created_at: timestamp_at(row, 7)?,
            updated_at: timestamp_at(row, 8)?,
        })
    }
}

impl Stored for Photo {
    const SELECT: &'static str =
        "SELECT id, couple_id, url, caption, date_taken, created_at, updated_at FROM photos";
    const ORDER: &'static str = "created_at DESC, rowid DESC";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let date_taken = match row.get::<_, Option<String>>(4)? {
            Some(raw) => Some(parse_date(&raw).map_err(|e| conversion_error(4, e))?),
            None => None,
        };
        Ok(Photo {
            id: uuid_at(row, 0)?,
            couple_id: uuid_at(row, 1)?,
            url: row.get(2)?,
            caption: row.get(3)?,
            date_taken,
            created_at: timestamp_at(row, 5)?,
            updated_at: timestamp_at(row, 6)?,
        })
    }
}

// -- Column helpers --

/// Stored timestamps are RFC 3339 UTC with microseconds, so text order is
/// time order.
pub fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite's own datetime('now') format, no timezone
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
}

pub fn parse_date(raw: &str) -> std::result::Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).map_err(|e| conversion_error(idx, e))
}

fn optional_timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => parse_timestamp(&raw).map(Some).map_err(|e| conversion_error(idx, e)),
        None => Ok(None),
    }
}

pub(crate) fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    parse_date(&raw).map_err(|e| conversion_error(idx, e))
}

/// Enum columns hold the same snake_case names the JSON wire format uses.
fn enum_at<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_value(serde_json::Value::String(raw)).map_err(|e| conversion_error(idx, e))
}
