use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use duo_types::models::{NewPhoto, Photo};

use crate::backend::Backend;
use crate::error::ClientError;
use crate::resource::Resource;
use crate::storage::KeyValueStore;

/// Photos are references only; the image bytes live wherever the URL points.
#[derive(Clone)]
pub struct Photos {
    resource: Resource<Photo>,
}

impl Photos {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            resource: Resource::new(backend, store, None),
        }
    }

    pub fn resource(&self) -> &Resource<Photo> {
        &self.resource
    }

    pub async fn items(&self) -> Vec<Photo> {
        self.resource.items().await
    }

    pub async fn add(&self, url: &str, caption: Option<&str>, date_taken: Option<NaiveDate>) -> Result<Photo, ClientError> {
        self.resource
            .insert(NewPhoto {
                url: url.to_string(),
                caption: caption.map(str::to_string),
                date_taken,
            })
            .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        self.resource.delete(id).await
    }
}
