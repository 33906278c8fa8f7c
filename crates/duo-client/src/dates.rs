use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use duo_types::models::{DateKind, ImportantDate, NewImportantDate};

use crate::backend::Backend;
use crate::derive;
use crate::error::ClientError;
use crate::resource::Resource;
use crate::storage::KeyValueStore;

/// Birthdays, anniversaries and the like, soonest first.
#[derive(Clone)]
pub struct ImportantDates {
    resource: Resource<ImportantDate>,
}

impl ImportantDates {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            resource: Resource::new(backend, store, None),
        }
    }

    pub fn resource(&self) -> &Resource<ImportantDate> {
        &self.resource
    }

    pub async fn items(&self) -> Vec<ImportantDate> {
        self.resource.items().await
    }

    /// A blank icon falls back to the calendar emoji.
    pub async fn add(
        &self,
        title: &str,
        date: NaiveDate,
        kind: DateKind,
        icon: Option<&str>,
        description: Option<&str>,
    ) -> Result<ImportantDate, ClientError> {
        self.resource
            .insert(NewImportantDate {
                title: title.to_string(),
                date,
                kind,
                icon: icon.map(str::to_string),
                description: description.map(str::to_string),
            })
            .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        self.resource.delete(id).await
    }

    /// Dates from `today` on, soonest first.
    pub async fn upcoming(&self, today: NaiveDate) -> Vec<ImportantDate> {
        derive::upcoming(&self.items().await, today)
    }

    pub async fn next_event(&self, today: NaiveDate) -> Option<ImportantDate> {
        self.upcoming(today).await.into_iter().next()
    }

    /// Every date ordered by distance from `today`, past or future.
    pub async fn by_proximity(&self, today: NaiveDate) -> Vec<ImportantDate> {
        let mut dates = self.items().await;
        derive::sort_by_proximity(&mut dates, today);
        dates
    }
}
