//! The seam between the client core and whatever holds the rows. The app
//! talks to a [`Backend`]; the remote one speaks HTTP and WebSocket to a
//! `duo` server, the local one runs the store and feed in-process.

mod local;
mod remote;

pub use local::LocalBackend;
pub use remote::RemoteBackend;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use duo_types::Table;
use duo_types::api::CreateCoupleRequest;
use duo_types::events::RowChange;
use duo_types::models::Couple;

use crate::error::BackendError;

#[async_trait]
pub trait Backend: Send + Sync {
    async fn generate_code(&self) -> Result<String, BackendError>;

    async fn create_couple(&self, request: &CreateCoupleRequest) -> Result<Couple, BackendError>;

    /// `Ok(None)` when no couple uses the code.
    async fn find_couple_by_code(&self, code: &str) -> Result<Option<Couple>, BackendError>;

    /// `Ok(None)` unless a couple has both this id and this code.
    async fn find_couple(&self, id: Uuid, code: &str) -> Result<Option<Couple>, BackendError>;

    /// Fill the second partner slot if it is empty. Returns the couple as it
    /// stands afterwards.
    async fn claim_partner_slot(&self, couple_id: Uuid, partner_name: &str) -> Result<Couple, BackendError>;

    /// Rows newest first (dates soonest first), at most `limit` of them.
    async fn list(&self, table: Table, couple_id: Uuid, limit: Option<u32>) -> Result<Vec<Value>, BackendError>;

    async fn insert(&self, table: Table, couple_id: Uuid, row: Value) -> Result<Value, BackendError>;

    async fn update(&self, table: Table, couple_id: Uuid, row_id: Uuid, patch: Value) -> Result<Value, BackendError>;

    async fn delete(&self, table: Table, couple_id: Uuid, row_id: Uuid) -> Result<(), BackendError>;

    /// Open a change channel for one table of one couple. Changes published
    /// after this returns are delivered.
    async fn subscribe(&self, table: Table, couple_id: Uuid) -> Result<Subscription, BackendError>;

    /// Forget any credentials tied to the current couple.
    fn end_session(&self) {}
}

/// A live change channel. Dropping it closes the channel.
pub struct Subscription {
    table: Table,
    couple_id: Uuid,
    rx: mpsc::Receiver<RowChange>,
    pump: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(table: Table, couple_id: Uuid, rx: mpsc::Receiver<RowChange>, pump: JoinHandle<()>) -> Self {
        Self {
            table,
            couple_id,
            rx,
            pump,
        }
    }

    /// Next change, or `None` once the channel has closed.
    pub async fn next(&mut self) -> Option<RowChange> {
        self.rx.recv().await
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn couple_id(&self) -> Uuid {
        self.couple_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Buffer between the transport and the listener; one reload covers any
/// number of queued changes, so a small one is plenty.
pub(crate) const SUBSCRIPTION_BUFFER: usize = 64;
