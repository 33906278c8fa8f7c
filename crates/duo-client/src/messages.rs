use std::sync::Arc;

use uuid::Uuid;

use duo_types::models::{Message, NewMessage};

use crate::backend::Backend;
use crate::error::ClientError;
use crate::resource::Resource;
use crate::storage::KeyValueStore;

/// Rows read per page of history.
pub const MESSAGE_PAGE: u32 = 50;

/// The couple's chat, newest first, one page at a time.
#[derive(Clone)]
pub struct Messages {
    resource: Resource<Message>,
}

impl Messages {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            resource: Resource::new(backend, store, Some(MESSAGE_PAGE)),
        }
    }

    pub fn resource(&self) -> &Resource<Message> {
        &self.resource
    }

    pub async fn items(&self) -> Vec<Message> {
        self.resource.items().await
    }

    /// Oldest first, the order a conversation is read in.
    pub async fn conversation(&self) -> Vec<Message> {
        let mut items = self.items().await;
        items.reverse();
        items
    }

    pub async fn send(&self, content: &str, sender_name: &str) -> Result<Message, ClientError> {
        self.resource
            .insert(NewMessage {
                content: content.to_string(),
                sender_name: sender_name.to_string(),
            })
            .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        self.resource.delete(id).await
    }

    pub async fn has_more(&self) -> bool {
        self.resource.has_more().await
    }

    /// Pull in the next older page, if there is one.
    pub async fn load_more(&self) {
        self.resource.grow().await
    }
}
