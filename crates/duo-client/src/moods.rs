use std::collections::HashMap;
use std::sync::Arc;

use duo_types::models::{Mood, MoodEntry, NewMoodEntry};

use crate::backend::Backend;
use crate::derive;
use crate::error::ClientError;
use crate::resource::Resource;
use crate::storage::KeyValueStore;

/// Only recent history matters for "how are we feeling".
pub const MOOD_WINDOW: u32 = 10;

#[derive(Clone)]
pub struct Moods {
    resource: Resource<MoodEntry>,
}

impl Moods {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            resource: Resource::new(backend, store, Some(MOOD_WINDOW)),
        }
    }

    pub fn resource(&self) -> &Resource<MoodEntry> {
        &self.resource
    }

    pub async fn items(&self) -> Vec<MoodEntry> {
        self.resource.items().await
    }

    pub async fn set_mood(&self, partner_name: &str, mood: Mood, note: Option<&str>) -> Result<MoodEntry, ClientError> {
        self.resource
            .insert(NewMoodEntry {
                partner_name: partner_name.to_string(),
                mood,
                note: note.map(str::to_string),
            })
            .await
    }

    /// Latest entry per partner within the loaded window.
    pub async fn current_moods(&self) -> HashMap<String, MoodEntry> {
        // Rows arrive newest first; the reducer wants arrival order.
        let mut entries = self.items().await;
        entries.reverse();
        derive::current_moods(&entries)
    }

    pub async fn my_mood(&self, my_name: &str) -> Option<MoodEntry> {
        self.current_moods().await.remove(my_name)
    }

    /// Newest entry written under any name other than `my_name`.
    pub async fn partner_mood(&self, my_name: &str) -> Option<MoodEntry> {
        self.items()
            .await
            .into_iter()
            .find(|entry| entry.partner_name != my_name)
    }
}
