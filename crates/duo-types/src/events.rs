use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level change, scoped to the couple that owns the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
    pub table: Table,
    pub couple_id: Uuid,
    pub kind: ChangeKind,
    pub row_id: Uuid,
}

impl RowChange {
    pub fn matches(&self, table: Table, couple_id: Uuid) -> bool {
        self.table == table && self.couple_id == couple_id
    }
}

/// Events sent over the change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FeedEvent {
    /// Server confirms the subscription is live
    Subscribed { table: Table, couple_id: Uuid },

    /// A matching row was inserted, updated or deleted
    Change(RowChange),

    /// Subscription refused
    Error { message: String },
}

/// Commands sent FROM client TO server over the change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FeedCommand {
    /// Listen for changes to one table of one couple
    Subscribe {
        table: Table,
        couple_id: Uuid,
        token: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_event_wire_shape() {
        let couple_id = Uuid::new_v4();
        let row_id = Uuid::new_v4();
        let event = FeedEvent::Change(RowChange {
            table: Table::BucketList,
            couple_id,
            kind: ChangeKind::Update,
            row_id,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Change");
        assert_eq!(json["data"]["table"], "bucket_list");
        assert_eq!(json["data"]["kind"], "update");
        let back: FeedEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn matches_requires_table_and_couple() {
        let couple_id = Uuid::new_v4();
        let change = RowChange {
            table: Table::Tasks,
            couple_id,
            kind: ChangeKind::Insert,
            row_id: Uuid::new_v4(),
        };
        assert!(change.matches(Table::Tasks, couple_id));
        assert!(!change.matches(Table::Messages, couple_id));
        assert!(!change.matches(Table::Tasks, Uuid::new_v4()));
    }
}
