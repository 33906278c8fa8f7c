//! One live-synced, couple-scoped table.
//!
//! A [`Resource`] holds the rows of one table for the active couple. It
//! reloads the whole list whenever the backend reports a change, after
//! each of its own successful writes, and on demand. It never patches the
//! list locally. Every activation bumps an epoch; a fetch that started
//! under an older epoch has its result discarded, so a slow response can
//! never overwrite the rows of a newer couple.

use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use duo_types::models::Record;
use duo_types::validation::Draft;

use crate::backend::{Backend, Subscription};
use crate::error::ClientError;
use crate::storage::KeyValueStore;

/// Last good read of a table, tagged with the couple it belongs to.
#[derive(Serialize, Deserialize)]
struct Snapshot<R> {
    couple_id: Uuid,
    rows: Vec<R>,
}

pub fn snapshot_key(table: duo_types::Table) -> String {
    format!("couple-app-{}-backup", table)
}

struct ResourceState<R> {
    epoch: u64,
    couple_id: Option<Uuid>,
    /// Row window; `None` reads everything.
    limit: Option<u32>,
    items: Vec<R>,
    loading: bool,
    has_more: bool,
    last_error: Option<String>,
}

struct ResourceInner<R> {
    backend: Arc<dyn Backend>,
    store: Arc<dyn KeyValueStore>,
    page_size: Option<u32>,
    state: RwLock<ResourceState<R>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

pub struct Resource<R: Record> {
    inner: Arc<ResourceInner<R>>,
}

impl<R: Record> Clone for Resource<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Record> Resource<R> {
    /// `page_size` caps how many rows are read; `None` reads the whole table.
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn KeyValueStore>, page_size: Option<u32>) -> Self {
        Self {
            inner: Arc::new(ResourceInner {
                backend,
                store,
                page_size,
                state: RwLock::new(ResourceState {
                    epoch: 0,
                    couple_id: None,
                    limit: page_size,
                    items: Vec::new(),
                    loading: false,
                    has_more: false,
                    last_error: None,
                }),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Start tracking `couple_id`: drop whatever was tracked before, open
    /// one change channel and do the initial read.
    pub async fn activate(&self, couple_id: Uuid) {
        let epoch = {
            let mut state = self.inner.state.write().await;
            state.epoch += 1;
            state.couple_id = Some(couple_id);
            state.limit = self.inner.page_size;
            state.items.clear();
            state.loading = true;
            state.has_more = false;
            state.last_error = None;
            state.epoch
        };
        self.inner.stop_listener();

        // Subscribe before the first read so a change that lands in between
        // still triggers a reload.
        match self.inner.backend.subscribe(R::TABLE, couple_id).await {
            Ok(subscription) => self.inner.start_listener(subscription, epoch).await,
            Err(e) => warn!("No live updates for {} of couple {}: {}", R::TABLE, couple_id, e),
        }

        self.inner.reload_at(epoch).await;
        info!("Tracking {} for couple {}", R::TABLE, couple_id);
    }

    /// Stop tracking and clear local state. Fetches still in flight are
    /// discarded when they land.
    pub async fn deactivate(&self) {
        {
            let mut state = self.inner.state.write().await;
            state.epoch += 1;
            state.couple_id = None;
            state.limit = self.inner.page_size;
            state.items.clear();
            state.loading = false;
            state.has_more = false;
            state.last_error = None;
        }
        self.inner.stop_listener();
        debug!("Stopped tracking {}", R::TABLE);
    }

    /// Re-read the table for the current couple. No-op when inactive.
    pub async fn reload(&self) {
        let epoch = self.inner.state.read().await.epoch;
        self.inner.reload_at(epoch).await;
    }

    /// Widen the row window by one page and re-read.
    pub async fn grow(&self) {
        let Some(page) = self.inner.page_size else {
            return;
        };
        let epoch = {
            let mut state = self.inner.state.write().await;
            if state.couple_id.is_none() || !state.has_more {
                return;
            }
            state.limit = Some(state.limit.unwrap_or(page).saturating_add(page));
            state.epoch
        };
        self.inner.reload_at(epoch).await;
    }

    pub async fn items(&self) -> Vec<R> {
        self.inner.state.read().await.items.clone()
    }

    pub async fn find(&self, id: Uuid) -> Option<R> {
        self.inner
            .state
            .read()
            .await
            .items
            .iter()
            .find(|row| row.id() == id)
            .cloned()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.state.read().await.loading
    }

    /// More rows exist past the current window.
    pub async fn has_more(&self) -> bool {
        self.inner.state.read().await.has_more
    }

    /// Why the last read failed, cleared by the next successful one.
    pub async fn last_error(&self) -> Option<String> {
        self.inner.state.read().await.last_error.clone()
    }

    pub async fn couple_id(&self) -> Option<Uuid> {
        self.inner.state.read().await.couple_id
    }

    /// Validate, write, then re-read on success. A failed write leaves the
    /// local rows untouched.
    pub async fn insert<D>(&self, draft: D) -> Result<R, ClientError>
    where
        D: Draft + Serialize,
    {
        let draft = draft.normalized()?;
        let couple_id = self.active_couple().await?;
        let payload = serde_json::to_value(&draft)?;

        let row = self
            .inner
            .backend
            .insert(R::TABLE, couple_id, payload)
            .await
            .map_err(|e| {
                error!("Insert into {} failed: {}", R::TABLE, e);
                e
            })?;

        self.reload().await;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn update<P>(&self, id: Uuid, patch: P) -> Result<R, ClientError>
    where
        P: Draft + Serialize,
    {
        let patch = patch.normalized()?;
        let couple_id = self.active_couple().await?;
        let payload = serde_json::to_value(&patch)?;

        let row = self
            .inner
            .backend
            .update(R::TABLE, couple_id, id, payload)
            .await
            .map_err(|e| {
                error!("Update of {} row {} failed: {}", R::TABLE, id, e);
                e
            })?;

        self.reload().await;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        let couple_id = self.active_couple().await?;

        self.inner
            .backend
            .delete(R::TABLE, couple_id, id)
            .await
            .map_err(|e| {
                error!("Delete of {} row {} failed: {}", R::TABLE, id, e);
                e
            })?;

        self.reload().await;
        Ok(())
    }

    async fn active_couple(&self) -> Result<Uuid, ClientError> {
        self.inner.state.read().await.couple_id.ok_or(ClientError::NoSession)
    }
}

impl<R: Record> ResourceInner<R> {
    async fn reload_at(&self, epoch: u64) {
        let (couple_id, limit) = {
            let state = self.state.read().await;
            match (state.epoch == epoch, state.couple_id) {
                (true, Some(couple_id)) => (couple_id, state.limit),
                _ => return,
            }
        };

        // One extra row tells us whether anything lies past the window.
        let fetch_limit = limit.map(|l| l.saturating_add(1));
        let result = self
            .backend
            .list(R::TABLE, couple_id, fetch_limit)
            .await
            .map_err(ClientError::from)
            .and_then(decode_rows::<R>);

        let mut state = self.state.write().await;
        if state.epoch != epoch {
            debug!("Discarding stale {} read for couple {}", R::TABLE, couple_id);
            return;
        }
        state.loading = false;

        match result {
            Ok(mut rows) => {
                state.has_more = match limit {
                    Some(limit) if rows.len() > limit as usize => {
                        rows.truncate(limit as usize);
                        true
                    }
                    _ => false,
                };
                self.save_snapshot(couple_id, &rows);
                state.items = rows;
                state.last_error = None;
            }
            Err(e) => {
                warn!("Reading {} for couple {} failed: {}", R::TABLE, couple_id, e);
                state.last_error = Some(e.to_string());
                if let Some(rows) = self.load_snapshot(couple_id) {
                    info!("Showing {} cached {} rows", rows.len(), R::TABLE);
                    state.items = rows;
                }
            }
        }
    }

    fn save_snapshot(&self, couple_id: Uuid, rows: &[R]) {
        let snapshot = Snapshot {
            couple_id,
            rows: rows.to_vec(),
        };
        let saved = serde_json::to_string(&snapshot)
            .map_err(ClientError::from)
            .and_then(|text| Ok(self.store.set(&snapshot_key(R::TABLE), &text)?));
        if let Err(e) = saved {
            warn!("Could not cache {} rows: {}", R::TABLE, e);
        }
    }

    /// Only a snapshot taken for this same couple is usable.
    fn load_snapshot(&self, couple_id: Uuid) -> Option<Vec<R>> {
        let text = self.store.get(&snapshot_key(R::TABLE))?;
        match serde_json::from_str::<Snapshot<R>>(&text) {
            Ok(snapshot) if snapshot.couple_id == couple_id => Some(snapshot.rows),
            Ok(_) => None,
            Err(e) => {
                warn!("Discarding unreadable {} snapshot: {}", R::TABLE, e);
                None
            }
        }
    }

    /// Installs the listener unless a newer activation has already started.
    /// The state lock is held across the swap so the epoch cannot move
    /// between the check and the install.
    async fn start_listener(self: &Arc<Self>, subscription: Subscription, epoch: u64) {
        let state = self.state.read().await;
        if state.epoch != epoch {
            debug!("Dropping superseded {} subscription", R::TABLE);
            return;
        }
        let inner = Arc::downgrade(self);
        let handle = tokio::spawn(listen(inner, subscription, epoch));
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(previous) = listener.replace(handle) {
                previous.abort();
            }
        }
    }

    fn stop_listener(&self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }
}

impl<R> Drop for ResourceInner<R> {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().ok().and_then(Option::take) {
            handle.abort();
        }
    }
}

async fn listen<R: Record>(inner: Weak<ResourceInner<R>>, mut subscription: Subscription, epoch: u64) {
    while let Some(change) = subscription.next().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if inner.state.read().await.epoch != epoch {
            break;
        }
        debug!("{:?} on {} row {}, reloading", change.kind, change.table, change.row_id);
        inner.reload_at(epoch).await;
    }
    debug!("Change listener for {} of couple {} ended", subscription.table(), subscription.couple_id());
}

fn decode_rows<R: Record>(rows: Vec<Value>) -> Result<Vec<R>, ClientError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(ClientError::from))
        .collect()
}
