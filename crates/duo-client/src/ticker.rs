use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::derive::{Elapsed, elapsed_since};

const TICK: Duration = Duration::from_secs(1);

/// Live "time together" counter, recomputed once a second. Display only;
/// nothing it produces is stored.
pub struct DaysCounter {
    rx: watch::Receiver<Elapsed>,
    task: JoinHandle<()>,
}

impl DaysCounter {
    pub fn start(anniversary: NaiveDate) -> Self {
        Self::start_with_clock(anniversary, || Local::now().naive_local())
    }

    pub fn start_with_clock<C>(anniversary: NaiveDate, clock: C) -> Self
    where
        C: Fn() -> NaiveDateTime + Send + 'static,
    {
        let (tx, rx) = watch::channel(elapsed_since(anniversary, clock()));

        let task = tokio::spawn(async move {
            let mut tick = tokio::time::interval(TICK);
            tick.tick().await;
            loop {
                tick.tick().await;
                if tx.send(elapsed_since(anniversary, clock())).is_err() {
                    break;
                }
            }
        });

        Self { rx, task }
    }

    pub fn current(&self) -> Elapsed {
        *self.rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Elapsed> {
        self.rx.clone()
    }
}

impl Drop for DaysCounter {
    fn drop(&mut self) {
        self.task.abort();
    }
}
