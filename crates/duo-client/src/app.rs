use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use duo_types::models::{Message, Mood, MoodEntry};

use crate::backend::{Backend, RemoteBackend};
use crate::bucket::BucketList;
use crate::config::ClientConfig;
use crate::dates::ImportantDates;
use crate::error::ClientError;
use crate::messages::Messages;
use crate::moods::Moods;
use crate::photos::Photos;
use crate::session::{CoupleContext, Session, SessionState};
use crate::storage::{FileStore, KeyValueStore, MemoryStore};
use crate::tasks::Tasks;
use crate::theme::ThemeSetting;
use crate::ticker::DaysCounter;

/// The whole client: one session plus one live resource per table. The
/// resources track the session's couple and are emptied on logout.
pub struct App {
    pub session: Session,
    pub tasks: Tasks,
    pub messages: Messages,
    pub moods: Moods,
    pub bucket: BucketList,
    pub dates: ImportantDates,
    pub photos: Photos,
    pub theme: ThemeSetting,
}

impl App {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            session: Session::new(backend.clone(), store.clone()),
            tasks: Tasks::new(backend.clone(), store.clone()),
            messages: Messages::new(backend.clone(), store.clone()),
            moods: Moods::new(backend.clone(), store.clone()),
            bucket: BucketList::new(backend.clone(), store.clone()),
            dates: ImportantDates::new(backend.clone(), store.clone()),
            photos: Photos::new(backend, store.clone()),
            theme: ThemeSetting::new(store),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let backend = RemoteBackend::new(&config.backend_url, &config.anon_key)?;
        let store: Arc<dyn KeyValueStore> = match &config.state_path {
            Some(path) => Arc::new(FileStore::open(path)?),
            None => Arc::new(MemoryStore::new()),
        };
        Ok(Self::new(Arc::new(backend), store))
    }

    /// Restore the saved identity and, if it holds, start tracking its couple.
    pub async fn start(&self) -> SessionState {
        let state = self.session.restore().await;
        if let SessionState::Authenticated(ctx) = &state {
            self.activate(ctx.couple_id).await;
        }
        state
    }

    pub async fn view(&self) -> SessionState {
        self.session.state().await
    }

    pub async fn create_couple(&self, partner_name: &str, anniversary_date: NaiveDate) -> Result<CoupleContext, ClientError> {
        let ctx = self.session.create(partner_name, anniversary_date).await?;
        self.activate(ctx.couple_id).await;
        Ok(ctx)
    }

    pub async fn join_couple(&self, code: &str, partner_name: &str) -> Result<CoupleContext, ClientError> {
        let ctx = self.session.join(code, partner_name).await?;
        self.activate(ctx.couple_id).await;
        Ok(ctx)
    }

    pub async fn logout(&self) {
        tokio::join!(
            self.tasks.resource().deactivate(),
            self.messages.resource().deactivate(),
            self.moods.resource().deactivate(),
            self.bucket.resource().deactivate(),
            self.dates.resource().deactivate(),
            self.photos.resource().deactivate(),
        );
        self.session.logout().await;
    }

    /// Message from whoever is using this client.
    pub async fn send_message(&self, content: &str) -> Result<Message, ClientError> {
        let ctx = self.session.context().await.ok_or(ClientError::NoSession)?;
        self.messages.send(content, &ctx.partner_name).await
    }

    pub async fn set_my_mood(&self, mood: Mood, note: Option<&str>) -> Result<MoodEntry, ClientError> {
        let ctx = self.session.context().await.ok_or(ClientError::NoSession)?;
        self.moods.set_mood(&ctx.partner_name, mood, note).await
    }

    /// Ticking "time together" for the current couple.
    pub async fn days_counter(&self) -> Option<DaysCounter> {
        let ctx = self.session.context().await?;
        Some(DaysCounter::start(ctx.anniversary_date))
    }

    async fn activate(&self, couple_id: Uuid) {
        tokio::join!(
            self.tasks.resource().activate(couple_id),
            self.messages.resource().activate(couple_id),
            self.moods.resource().activate(couple_id),
            self.bucket.resource().activate(couple_id),
            self.dates.resource().activate(couple_id),
            self.photos.resource().activate(couple_id),
        );
        info!("Live data active for couple {}", couple_id);
    }
}
