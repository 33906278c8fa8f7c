use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

use duo_db::{Database, StoreError};
use duo_feed::ChangeFeed;
use duo_types::Table;
use duo_types::api::{ClaimPartnerRequest, CreateCoupleRequest};
use duo_types::models::Couple;
use duo_types::validation::Draft;

use super::{Backend, SUBSCRIPTION_BUFFER, Subscription};
use crate::error::BackendError;

/// Store and change feed in the same process. Several clients sharing one
/// `LocalBackend` see each other's writes the way two devices would.
#[derive(Clone)]
pub struct LocalBackend {
    db: Arc<Database>,
    feed: ChangeFeed,
}

impl LocalBackend {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            feed: ChangeFeed::new(),
        }
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    async fn run<T, F>(&self, f: F) -> Result<T, BackendError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| BackendError::Internal(format!("store task failed: {}", e)))?
            .map_err(BackendError::from)
    }
}

impl From<StoreError> for BackendError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Invalid(e) => BackendError::Rejected(e.to_string()),
            StoreError::Malformed(e) => BackendError::Rejected(e.to_string()),
            StoreError::NotFound(_) => BackendError::NotFound,
            StoreError::CodeTaken => BackendError::Rejected("couple code already in use".into()),
            StoreError::Db(e) => {
                error!("Store error: {:#}", e);
                BackendError::Internal(e.to_string())
            }
        }
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn generate_code(&self) -> Result<String, BackendError> {
        self.run(|db| Ok(db.generate_couple_code()?)).await
    }

    async fn create_couple(&self, request: &CreateCoupleRequest) -> Result<Couple, BackendError> {
        let request = request.clone().normalized().map_err(StoreError::from)?;
        self.run(move |db| {
            db.insert_couple(&request.couple_code, &request.partner_name, request.anniversary_date)
        })
        .await
    }

    async fn find_couple_by_code(&self, code: &str) -> Result<Option<Couple>, BackendError> {
        let code = code.to_string();
        self.run(move |db| Ok(db.get_couple_by_code(&code)?)).await
    }

    async fn find_couple(&self, id: Uuid, code: &str) -> Result<Option<Couple>, BackendError> {
        let code = code.to_string();
        self.run(move |db| Ok(db.get_couple_by_id_and_code(id, &code)?)).await
    }

    async fn claim_partner_slot(&self, couple_id: Uuid, partner_name: &str) -> Result<Couple, BackendError> {
        let request = ClaimPartnerRequest {
            partner_name: partner_name.to_string(),
        }
        .normalized()
        .map_err(StoreError::from)?;
        self.run(move |db| {
            db.claim_partner_slot(couple_id, &request.partner_name)?
                .ok_or(StoreError::NotFound("couple"))
        })
        .await
    }

    async fn list(&self, table: Table, couple_id: Uuid, limit: Option<u32>) -> Result<Vec<Value>, BackendError> {
        self.run(move |db| db.list_rows(table, couple_id, limit)).await
    }

    async fn insert(&self, table: Table, couple_id: Uuid, row: Value) -> Result<Value, BackendError> {
        let (row, change) = self.run(move |db| db.insert_row(table, couple_id, row)).await?;
        self.feed.publish(change);
        Ok(row)
    }

    async fn update(&self, table: Table, couple_id: Uuid, row_id: Uuid, patch: Value) -> Result<Value, BackendError> {
        let (row, change) = self
            .run(move |db| db.update_row(table, couple_id, row_id, patch))
            .await?;
        self.feed.publish(change);
        Ok(row)
    }

    async fn delete(&self, table: Table, couple_id: Uuid, row_id: Uuid) -> Result<(), BackendError> {
        let change = self.run(move |db| db.delete_row(table, couple_id, row_id)).await?;
        self.feed.publish(change);
        Ok(())
    }

    async fn subscribe(&self, table: Table, couple_id: Uuid) -> Result<Subscription, BackendError> {
        // The watch exists before this returns, so nothing published after
        // the caller gets its subscription is missed.
        let mut watch = self.feed.watch(table, couple_id);
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        let pump = tokio::spawn(async move {
            while let Some(change) = watch.next().await {
                if tx.send(change).await.is_err() {
                    break;
                }
            }
            debug!("Local feed for {} of couple {} closed", table, couple_id);
        });

        Ok(Subscription::new(table, couple_id, rx, pump))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    use duo_types::events::ChangeKind;

    async fn backend_with_couple() -> (LocalBackend, Couple) {
        let backend = LocalBackend::in_memory().unwrap();
        let code = backend.generate_code().await.unwrap();
        let couple = backend
            .create_couple(&CreateCoupleRequest {
                couple_code: code,
                partner_name: "Ana".into(),
                anniversary_date: NaiveDate::from_ymd_opt(2024, 11, 13).unwrap(),
            })
            .await
            .unwrap();
        (backend, couple)
    }

    #[tokio::test]
    async fn writes_are_published_to_subscribers() {
        let (backend, couple) = backend_with_couple().await;
        let mut sub = backend.subscribe(Table::Tasks, couple.id).await.unwrap();

        let row = backend
            .insert(Table::Tasks, couple.id, json!({ "title": "Call mom" }))
            .await
            .unwrap();

        let change = sub.next().await.unwrap();
        assert_eq!(change.kind, ChangeKind::Insert);
        assert_eq!(change.row_id.to_string(), row["id"].as_str().unwrap());
    }

    #[tokio::test]
    async fn store_errors_map_to_backend_errors() {
        let (backend, couple) = backend_with_couple().await;

        let err = backend
            .insert(Table::Tasks, couple.id, json!({ "title": "  " }))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));

        let err = backend
            .delete(Table::Tasks, couple.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound));
    }

    #[tokio::test]
    async fn lookups_need_the_right_code() {
        let (backend, couple) = backend_with_couple().await;
        let found = backend.find_couple_by_code(&couple.couple_code).await.unwrap();
        assert_eq!(found.map(|c| c.id), Some(couple.id));
        assert!(backend.find_couple(couple.id, "ZZZZZZ").await.unwrap().is_none());
    }
}
