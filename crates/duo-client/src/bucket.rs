use std::sync::Arc;

use uuid::Uuid;

use duo_types::Table;
use duo_types::models::{BucketItem, BucketPatch, Category, NewBucketItem, Priority};

use crate::backend::Backend;
use crate::derive::{self, BucketFilter, Progress};
use crate::error::ClientError;
use crate::resource::Resource;
use crate::storage::KeyValueStore;

#[derive(Clone)]
pub struct BucketList {
    resource: Resource<BucketItem>,
}

impl BucketList {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            resource: Resource::new(backend, store, None),
        }
    }

    pub fn resource(&self) -> &Resource<BucketItem> {
        &self.resource
    }

    pub async fn items(&self) -> Vec<BucketItem> {
        self.resource.items().await
    }

    pub async fn add(
        &self,
        title: &str,
        category: Category,
        priority: Priority,
        notes: Option<&str>,
    ) -> Result<BucketItem, ClientError> {
        self.resource
            .insert(NewBucketItem {
                title: title.to_string(),
                category,
                priority,
                notes: notes.map(str::to_string),
            })
            .await
    }

    /// The store stamps or clears `completed_at` to match.
    pub async fn set_completed(&self, id: Uuid, completed: bool) -> Result<BucketItem, ClientError> {
        self.resource
            .update(
                id,
                BucketPatch {
                    completed: Some(completed),
                    ..Default::default()
                },
            )
            .await
    }

    pub async fn toggle(&self, id: Uuid) -> Result<BucketItem, ClientError> {
        let item = self
            .resource
            .find(id)
            .await
            .ok_or(ClientError::UnknownRow(Table::BucketList, id))?;
        self.set_completed(id, !item.completed).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        self.resource.delete(id).await
    }

    pub async fn progress(&self) -> Progress {
        derive::progress(&self.items().await)
    }

    pub async fn filtered(&self, filter: BucketFilter) -> Vec<BucketItem> {
        derive::filter_bucket(&self.items().await, filter)
    }
}
