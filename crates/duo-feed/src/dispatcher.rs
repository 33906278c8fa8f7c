use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{trace, warn};
use uuid::Uuid;

use duo_types::Table;
use duo_types::events::{ChangeKind, RowChange};

const FEED_CAPACITY: usize = 1024;

/// Fans row changes out to every live subscription.
#[derive(Clone)]
pub struct ChangeFeed {
    inner: Arc<ChangeFeedInner>,
}

struct ChangeFeedInner {
    /// Every subscriber sees every change and filters on its own (table, couple)
    broadcast_tx: broadcast::Sender<RowChange>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            inner: Arc::new(ChangeFeedInner { broadcast_tx }),
        }
    }

    /// Publish a change. Returns how many subscribers were listening.
    pub fn publish(&self, change: RowChange) -> usize {
        let delivered = self.inner.broadcast_tx.send(change.clone()).unwrap_or(0);
        trace!(
            "{:?} {} row {} for couple {} -> {} listeners",
            change.kind, change.table, change.row_id, change.couple_id, delivered
        );
        delivered
    }

    /// Unfiltered receiver over every change.
    pub fn subscribe(&self) -> broadcast::Receiver<RowChange> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Receiver for one table of one couple.
    pub fn watch(&self, table: Table, couple_id: Uuid) -> Watch {
        Watch {
            rx: self.subscribe(),
            table,
            couple_id,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.broadcast_tx.receiver_count()
    }
}

pub struct Watch {
    rx: broadcast::Receiver<RowChange>,
    table: Table,
    couple_id: Uuid,
}

impl Watch {
    /// Next change matching this watch, or `None` once the feed is gone.
    ///
    /// A lagged receiver has lost changes it cannot name, so it yields a
    /// nil-row update; consumers reload on any change anyway.
    pub async fn next(&mut self) -> Option<RowChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.matches(self.table, self.couple_id) => return Some(change),
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => {
                    warn!("{} watch for couple {} lagged by {} changes", self.table, self.couple_id, n);
                    return Some(RowChange {
                        table: self.table,
                        couple_id: self.couple_id,
                        kind: ChangeKind::Update,
                        row_id: Uuid::nil(),
                    });
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn couple_id(&self) -> Uuid {
        self.couple_id
    }
}
