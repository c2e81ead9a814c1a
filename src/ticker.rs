//! Periodic background task with graceful stop.

use crate::error::panic_message;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Runs an async tick on a fixed period until stopped.
///
/// The first tick fires one full period after spawning. A panicking tick is logged and
/// the loop keeps going. `stop` lets an in-flight tick finish before returning.
pub struct Ticker {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Ticker {
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // `interval` completes its first tick immediately.
            timer.tick().await;
            debug!(ticker = name, period_ms = period.as_millis() as u64, "Ticker started");
            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if let Err(payload) = AssertUnwindSafe(tick()).catch_unwind().await {
                            warn!(ticker = name, panic = %panic_message(payload), "Tick panicked");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!(ticker = name, "Ticker exited");
        });
        Self {
            name,
            shutdown_tx,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(ticker = self.name, error = %e, "Ticker task ended abnormally");
        }
    }
}
