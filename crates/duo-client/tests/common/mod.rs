#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::Notify;
use uuid::Uuid;

use duo_client::error::BackendError;
use duo_client::{Backend, LocalBackend, Resource, Subscription};
use duo_types::Table;
use duo_types::api::CreateCoupleRequest;
use duo_types::models::{Couple, Record};

/// In-process backend with switches for failing reads or writes and for
/// parking reads or subscriptions of one couple until released.
pub struct TestBackend {
    pub inner: LocalBackend,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub calls: AtomicUsize,
    pub parked: AtomicUsize,
    pub parked_subscriptions: AtomicUsize,
    held: Mutex<Option<(Uuid, Arc<Notify>)>>,
    held_subscriptions: Mutex<Option<(Uuid, Arc<Notify>)>>,
}

impl TestBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: LocalBackend::in_memory().unwrap(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            parked: AtomicUsize::new(0),
            parked_subscriptions: AtomicUsize::new(0),
            held: Mutex::new(None),
            held_subscriptions: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Park every read of `couple_id` until the returned gate is notified.
    pub fn hold_reads_for(&self, couple_id: Uuid) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.held.lock().unwrap() = Some((couple_id, gate.clone()));
        gate
    }

    /// Park the next subscription to `couple_id` until the gate is notified.
    pub fn hold_subscriptions_for(&self, couple_id: Uuid) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.held_subscriptions.lock().unwrap() = Some((couple_id, gate.clone()));
        gate
    }

    pub fn release_reads(&self) {
        if let Some((_, gate)) = self.held.lock().unwrap().take() {
            gate.notify_waiters();
            gate.notify_one();
        }
    }

    pub async fn couple(&self, name: &str) -> Couple {
        let code = self.inner.generate_code().await.unwrap();
        self.inner
            .create_couple(&CreateCoupleRequest {
                couple_code: code,
                partner_name: name.into(),
                anniversary_date: anniversary(),
            })
            .await
            .unwrap()
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn check_writes(&self) -> Result<(), BackendError> {
        self.tick();
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for TestBackend {
    async fn generate_code(&self) -> Result<String, BackendError> {
        self.tick();
        self.inner.generate_code().await
    }

    async fn create_couple(&self, request: &CreateCoupleRequest) -> Result<Couple, BackendError> {
        self.check_writes()?;
        self.inner.create_couple(request).await
    }

    async fn find_couple_by_code(&self, code: &str) -> Result<Option<Couple>, BackendError> {
        self.tick();
        self.inner.find_couple_by_code(code).await
    }

    async fn find_couple(&self, id: Uuid, code: &str) -> Result<Option<Couple>, BackendError> {
        self.tick();
        self.inner.find_couple(id, code).await
    }

    async fn claim_partner_slot(&self, couple_id: Uuid, partner_name: &str) -> Result<Couple, BackendError> {
        self.check_writes()?;
        self.inner.claim_partner_slot(couple_id, partner_name).await
    }

    async fn list(&self, table: Table, couple_id: Uuid, limit: Option<u32>) -> Result<Vec<Value>, BackendError> {
        self.tick();
        let gate = match &*self.held.lock().unwrap() {
            Some((held, gate)) if *held == couple_id => Some(gate.clone()),
            _ => None,
        };
        if let Some(gate) = gate {
            self.parked.fetch_add(1, Ordering::SeqCst);
            gate.notified().await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("offline".into()));
        }
        self.inner.list(table, couple_id, limit).await
    }

    async fn insert(&self, table: Table, couple_id: Uuid, row: Value) -> Result<Value, BackendError> {
        self.check_writes()?;
        self.inner.insert(table, couple_id, row).await
    }

    async fn update(&self, table: Table, couple_id: Uuid, row_id: Uuid, patch: Value) -> Result<Value, BackendError> {
        self.check_writes()?;
        self.inner.update(table, couple_id, row_id, patch).await
    }

    async fn delete(&self, table: Table, couple_id: Uuid, row_id: Uuid) -> Result<(), BackendError> {
        self.check_writes()?;
        self.inner.delete(table, couple_id, row_id).await
    }

    async fn subscribe(&self, table: Table, couple_id: Uuid) -> Result<Subscription, BackendError> {
        let gate = match &*self.held_subscriptions.lock().unwrap() {
            Some((held, gate)) if *held == couple_id => Some(gate.clone()),
            _ => None,
        };
        if let Some(gate) = gate {
            self.parked_subscriptions.fetch_add(1, Ordering::SeqCst);
            gate.notified().await;
        }
        self.inner.subscribe(table, couple_id).await
    }
}

pub fn anniversary() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 11, 13).unwrap()
}

/// Poll until the resource's rows satisfy `pred`, or fail after two seconds.
pub async fn wait_for<R, F>(resource: &Resource<R>, pred: F) -> Vec<R>
where
    R: Record,
    F: Fn(&[R]) -> bool,
{
    for _ in 0..200 {
        let items = resource.items().await;
        if pred(&items) {
            return items;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} rows never reached the expected state", R::TABLE);
}
