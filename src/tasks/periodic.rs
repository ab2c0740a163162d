//! Periodic Background Tasks
//!
//! Long-lived loops that wake on a fixed interval until told to stop.
//! Used for the expiry sweep, the snapshot saver and the row reloader.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

// == Periodic Task Handle ==
/// Handle to a running periodic loop.
///
/// The loop suspends only while waiting for the next tick or for the stop
/// signal. Dropping the handle stops the loop as well.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Signals the loop to stop. Calling this more than once is harmless.
    pub fn stop(&self) {
        if !self.stop_tx.send_replace(true) {
            debug!(task = self.name, "Stop requested");
        }
    }

    /// Stops the loop and waits for it to exit.
    ///
    /// A job already in progress runs to completion first.
    pub async fn shutdown(self) {
        self.stop();
        let _ = self.handle.await;
    }

    /// Returns true once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawns `job` to run every `period`, starting one full period from now.
///
/// # Arguments
/// * `name` - Task name used in log output
/// * `period` - Interval between runs
/// * `job` - Produces the future to run on each tick
pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, mut job: F) -> PeriodicTask
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        info!(task = name, period_ms = period.as_millis() as u64, "Starting background task");

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the immediate first tick
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    job().await;
                }
                changed = stop_rx.changed() => {
                    // Err: the handle was dropped
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!(task = name, "Background task stopped");
    });

    PeriodicTask {
        name,
        stop_tx,
        handle,
    }
}
