use std::sync::Arc;

use uuid::Uuid;

use duo_types::models::{NewTask, Task, TaskPatch};

use crate::backend::Backend;
use crate::error::ClientError;
use crate::resource::Resource;
use crate::storage::KeyValueStore;

/// The shared to-do list, newest first.
#[derive(Clone)]
pub struct Tasks {
    resource: Resource<Task>,
}

impl Tasks {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            resource: Resource::new(backend, store, None),
        }
    }

    pub fn resource(&self) -> &Resource<Task> {
        &self.resource
    }

    pub async fn items(&self) -> Vec<Task> {
        self.resource.items().await
    }

    pub async fn add(&self, title: &str) -> Result<Task, ClientError> {
        self.resource
            .insert(NewTask {
                title: title.to_string(),
            })
            .await
    }

    pub async fn set_completed(&self, id: Uuid, completed: bool) -> Result<Task, ClientError> {
        self.resource
            .update(
                id,
                TaskPatch {
                    completed: Some(completed),
                    ..Default::default()
                },
            )
            .await
    }

    /// Flip completion based on the row as currently loaded.
    pub async fn toggle(&self, id: Uuid) -> Result<Task, ClientError> {
        let task = self
            .resource
            .find(id)
            .await
            .ok_or(ClientError::UnknownRow(duo_types::Table::Tasks, id))?;
        self.set_completed(id, !task.completed).await
    }

    pub async fn rename(&self, id: Uuid, title: &str) -> Result<Task, ClientError> {
        self.resource
            .update(
                id,
                TaskPatch {
                    title: Some(title.to_string()),
                    ..Default::default()
                },
            )
            .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        self.resource.delete(id).await
    }

    pub async fn pending_count(&self) -> usize {
        self.items().await.iter().filter(|t| !t.completed).count()
    }
}
