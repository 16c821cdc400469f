//! Fixed-interval poll scheduling.
//!
//! One background task runs ticks strictly one at a time. The wait
//! between ticks is interruptible: a stop request wakes the sleeper
//! immediately, and `stop` does not return until the loop has fully
//! exited — after that, no tick runs and no file is written again.
//!
//! The next deadline is computed *after* a tick completes, so a tick
//! that overruns the interval delays later ticks but never stacks
//! overlapping ones.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// One unit of refresh work, invoked by the scheduler once per tick.
///
/// Implementations are free to take as long as they need; the scheduler
/// never cancels a tick mid-flight.
#[async_trait]
pub trait TickHandler: Send {
    async fn on_tick(&mut self);
}

/// Owns the repeat-forever timing loop and its shutdown handshake.
///
/// The handshake is two signals: a watch channel carries the stop
/// request into the loop (wake-on-request), and the task's join handle
/// carries the exit confirmation back out (block-until-exited).
pub struct PollScheduler {
    stop_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self {
            stop_tx: None,
            handle: None,
        }
    }

    /// Whether the poll loop has been started and not yet stopped.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Start the poll loop. The first tick fires immediately.
    ///
    /// Starting an already-running scheduler is a lifecycle misuse and
    /// fails hard rather than spawning a second loop.
    pub fn start<H>(&mut self, interval: Duration, mut handler: H) -> Result<()>
    where
        H: TickHandler + 'static,
    {
        if self.handle.is_some() {
            bail!("Poll scheduler is already running");
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            loop {
                if *stop_rx.borrow() {
                    break;
                }

                handler.on_tick().await;

                // Deadline is relative to tick completion, not tick start.
                let deadline = Instant::now() + interval;
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {}
                    _ = stop_rx.changed() => break,
                }
            }

            debug!("Poll loop exited");
        });

        self.stop_tx = Some(stop_tx);
        self.handle = Some(handle);
        Ok(())
    }

    /// Request the loop to stop and wait until it has exited.
    ///
    /// Wakes a sleeping loop immediately; a tick already in flight runs
    /// to completion first. No-op if the scheduler is not running.
    pub async fn stop(&mut self) {
        let Some(stop_tx) = self.stop_tx.take() else {
            return;
        };
        let _ = stop_tx.send(true);

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Poll loop task did not exit cleanly");
            }
        }
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
