//! Periodic state polling
//!
//! Runs `query_state` on an interval and publishes the result on a watch
//! channel. Missed ticks are delayed rather than bursted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use neptun_core::constants::MIN_POLL_INTERVAL;

use crate::device::Device;
use crate::snapshot::Snapshot;

/// Latest poll outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStatus {
    /// Most recent successful snapshot, kept across failed polls
    pub snapshot: Option<Snapshot>,
    pub reachable: bool,
    pub last_error: Option<String>,
}

pub struct Poller {
    status: watch::Receiver<PollStatus>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl Poller {
    /// Start polling `device` every `interval`, at most once per
    /// [`MIN_POLL_INTERVAL`]
    pub fn spawn(device: Arc<Device>, interval: Duration) -> Self {
        let interval = interval.max(MIN_POLL_INTERVAL);
        let (status_tx, status) = watch::channel(PollStatus::default());
        let (shutdown, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(run(device, interval, status_tx, shutdown_rx));

        Self {
            status,
            shutdown: Some(shutdown),
            handle,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PollStatus> {
        self.status.clone()
    }

    pub fn status(&self) -> PollStatus {
        self.status.borrow().clone()
    }

    /// Stop polling and wait for the task to finish
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Err(e) = (&mut self.handle).await {
            warn!("Poller task ended abnormally: {}", e);
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if self.shutdown.is_some() {
            self.handle.abort();
        }
    }
}

async fn run(
    device: Arc<Device>,
    interval: Duration,
    status: watch::Sender<PollStatus>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Polling {} every {:?}", device.config().address(), interval);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let next = match device.query_state().await {
                    Ok(snapshot) => PollStatus {
                        snapshot: Some(snapshot),
                        reachable: true,
                        last_error: None,
                    },
                    Err(e) => PollStatus {
                        snapshot: device.latest_state(),
                        reachable: false,
                        last_error: Some(e.to_string()),
                    },
                };

                status.send_replace(next);
            }
        }
    }

    debug!("Poller stopped");
}
