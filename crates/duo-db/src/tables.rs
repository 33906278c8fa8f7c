//! Table-generic row access in the JSON shape the HTTP API and the client
//! speak. Each call validates the payload for its table, runs the typed
//! query, and reports the change the feed should publish.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use duo_types::Table;
use duo_types::ValidationError;
use duo_types::events::{ChangeKind, RowChange};
use duo_types::models::{
    BucketItem, BucketPatch, ImportantDate, Message, MoodEntry, NewBucketItem, NewImportantDate,
    NewMessage, NewMoodEntry, NewPhoto, NewTask, Photo, Task, TaskPatch,
};
use duo_types::validation::Draft;

use crate::rows::Stored;
use crate::{Database, StoreError};

type StoreResult<T> = std::result::Result<T, StoreError>;

impl Database {
    pub fn list_rows(&self, table: Table, couple_id: Uuid, limit: Option<u32>) -> StoreResult<Vec<Value>> {
        match table {
            Table::Tasks => to_values(self.list::<Task>(couple_id, limit)?),
            Table::Messages => to_values(self.list::<Message>(couple_id, limit)?),
            Table::MoodEntries => to_values(self.list::<MoodEntry>(couple_id, limit)?),
            Table::BucketList => to_values(self.list::<BucketItem>(couple_id, limit)?),
            Table::ImportantDates => to_values(self.list::<ImportantDate>(couple_id, limit)?),
            Table::Photos => to_values(self.list::<Photo>(couple_id, limit)?),
        }
    }

    pub fn insert_row(&self, table: Table, couple_id: Uuid, payload: Value) -> StoreResult<(Value, RowChange)> {
        if !self.couple_exists(couple_id)? {
            return Err(StoreError::NotFound("couple"));
        }

        let row = match table {
            Table::Tasks => to_value(self.insert_task(couple_id, &draft::<NewTask>(payload)?)?),
            Table::Messages => to_value(self.insert_message(couple_id, &draft::<NewMessage>(payload)?)?),
            Table::MoodEntries => to_value(self.insert_mood(couple_id, &draft::<NewMoodEntry>(payload)?)?),
            Table::BucketList => {
                to_value(self.insert_bucket_item(couple_id, &draft::<NewBucketItem>(payload)?)?)
            }
            Table::ImportantDates => {
                to_value(self.insert_important_date(couple_id, &draft::<NewImportantDate>(payload)?)?)
            }
            Table::Photos => to_value(self.insert_photo(couple_id, &draft::<NewPhoto>(payload)?)?),
        }?;

        let change = change_for(table, couple_id, ChangeKind::Insert, &row)?;
        Ok((row, change))
    }

    /// Only tasks and bucket items are mutable; the rest are append-only or
    /// replace-by-delete.
    pub fn update_row(
        &self,
        table: Table,
        couple_id: Uuid,
        row_id: Uuid,
        payload: Value,
    ) -> StoreResult<(Value, RowChange)> {
        let row = match table {
            Table::Tasks => {
                let patch = draft::<TaskPatch>(payload)?;
                self.update_task(couple_id, row_id, &patch)?.map(to_value)
            }
            Table::BucketList => {
                let patch = draft::<BucketPatch>(payload)?;
                self.update_bucket_item(couple_id, row_id, &patch)?.map(to_value)
            }
            other => return Err(ValidationError::Immutable(other).into()),
        }
        .ok_or(StoreError::NotFound("row"))??;

        let change = RowChange {
            table,
            couple_id,
            kind: ChangeKind::Update,
            row_id,
        };
        Ok((row, change))
    }

    pub fn delete_row(&self, table: Table, couple_id: Uuid, row_id: Uuid) -> StoreResult<RowChange> {
        if !self.delete_from(table, couple_id, row_id)? {
            return Err(StoreError::NotFound("row"));
        }
        Ok(RowChange {
            table,
            couple_id,
            kind: ChangeKind::Delete,
            row_id,
        })
    }
}

fn draft<D: Draft + DeserializeOwned>(payload: Value) -> StoreResult<D> {
    let draft: D = serde_json::from_value(payload)?;
    Ok(draft.normalized()?)
}

fn to_value<T: Serialize>(row: T) -> StoreResult<Value> {
    Ok(serde_json::to_value(row)?)
}

fn to_values<R: Stored>(rows: Vec<R>) -> StoreResult<Vec<Value>> {
    rows.into_iter().map(to_value).collect()
}

fn change_for(table: Table, couple_id: Uuid, kind: ChangeKind, row: &Value) -> StoreResult<RowChange> {
    let row_id = row
        .get("id")
        .and_then(Value::as_str)
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(|| StoreError::Db(anyhow::anyhow!("stored {} row has no id", table)))?;
    Ok(RowChange {
        table,
        couple_id,
        kind,
        row_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn db_with_couple() -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let couple = db
            .insert_couple("MNB456", "Ana", NaiveDate::from_ymd_opt(2024, 11, 13).unwrap())
            .unwrap();
        (db, couple.id)
    }

    #[test]
    fn insert_validates_and_reports_change() {
        let (db, couple_id) = db_with_couple();

        let (row, change) = db
            .insert_row(Table::Messages, couple_id, json!({ "content": "  hi  ", "sender_name": "Ana" }))
            .unwrap();
        assert_eq!(row["content"], "hi");
        assert_eq!(change.kind, ChangeKind::Insert);
        assert_eq!(change.row_id.to_string(), row["id"].as_str().unwrap());

        let err = db
            .insert_row(Table::Messages, couple_id, json!({ "content": "   ", "sender_name": "Ana" }))
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(ValidationError::Empty(_))));

        let err = db
            .insert_row(Table::Tasks, couple_id, json!({ "title": "x", "owner": "me" }))
            .unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn insert_for_unknown_couple_is_not_found() {
        let (db, _) = db_with_couple();
        let err = db
            .insert_row(Table::Tasks, Uuid::new_v4(), json!({ "title": "x" }))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("couple")));
    }

    #[test]
    fn append_only_tables_refuse_updates() {
        let (db, couple_id) = db_with_couple();
        let (row, _) = db
            .insert_row(Table::MoodEntries, couple_id, json!({ "partner_name": "Ana", "mood": "happy" }))
            .unwrap();
        let id = Uuid::parse_str(row["id"].as_str().unwrap()).unwrap();
        let err = db
            .update_row(Table::MoodEntries, couple_id, id, json!({ "mood": "sad" }))
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(ValidationError::Immutable(Table::MoodEntries))));
    }

    #[test]
    fn update_and_delete_missing_rows_are_not_found() {
        let (db, couple_id) = db_with_couple();
        let missing = Uuid::new_v4();
        assert!(matches!(
            db.update_row(Table::Tasks, couple_id, missing, json!({ "completed": true })),
            Err(StoreError::NotFound("row"))
        ));
        assert!(matches!(
            db.delete_row(Table::Photos, couple_id, missing),
            Err(StoreError::NotFound("row"))
        ));
    }

    #[test]
    fn list_rows_serializes_wire_shape() {
        let (db, couple_id) = db_with_couple();
        db.insert_row(
            Table::ImportantDates,
            couple_id,
            json!({ "title": "Her birthday", "date": "2025-04-09", "type": "birthday" }),
        )
        .unwrap();
        let rows = db.list_rows(Table::ImportantDates, couple_id, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["type"], "birthday");
        assert_eq!(rows[0]["date"], "2025-04-09");
    }
}
