//! High-level controller interface

use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use neptun_core::{counter_payload, decode_frame, Command, SystemControl};
use neptun_transport::{SharedClock, TokioClock, Transport};
use neptun_types::{DeviceState, LineId, LineMode};

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::snapshot::Snapshot;

/// Outcome of an accepted valve command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValveCommand {
    /// Command sent; further valve commands are refused until the valve
    /// reports `target_open` or the settle window ends
    Accepted { target_open: bool },
}

/// Valve command still within its settle window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingValveOperation {
    pub requested_at: Instant,
    pub target_open: bool,
}

#[derive(Debug, Default)]
struct Status {
    snapshot: Option<Snapshot>,
    pending_valve: Option<PendingValveOperation>,
    reachable: bool,
    last_success: Option<Instant>,
}

/// Neptun controller
///
/// Every write is a read-modify-write of the full control tuple: the state is
/// queried first and only the requested field is changed.
///
/// # Examples
///
/// ```no_run
/// use neptun::{Config, Device};
///
/// #[tokio::main]
/// async fn main() -> neptun::Result<()> {
///     let device = Device::new(Config::new("192.168.1.30"));
///
///     let snapshot = device.query_state().await?;
///     println!("{}", snapshot);
///
///     if snapshot.leak_alarm() {
///         device.set_valve(false).await?;
///     }
///
///     device.close().await?;
///     Ok(())
/// }
/// ```
pub struct Device {
    dispatcher: Dispatcher,
    clock: SharedClock,
    config: Config,
    status: Mutex<Status>,

    /// Held across a whole read-modify-write
    writes: tokio::sync::Mutex<()>,
}

impl Device {
    /// Create a controller reached over TCP
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, std::sync::Arc::new(TokioClock))
    }

    pub fn with_clock(config: Config, clock: SharedClock) -> Self {
        let dispatcher = Dispatcher::connect_tcp(&config, clock.clone());
        Self::from_parts(config, dispatcher, clock)
    }

    /// Create a controller over any transport
    pub fn with_transport(config: Config, transport: Box<dyn Transport>, clock: SharedClock) -> Self {
        let dispatcher = Dispatcher::with_transport(transport, clock.clone(), &config);
        Self::from_parts(config, dispatcher, clock)
    }

    fn from_parts(config: Config, dispatcher: Dispatcher, clock: SharedClock) -> Self {
        Self {
            dispatcher,
            clock,
            config,
            status: Mutex::new(Status::default()),
            writes: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read and decode the current system state
    ///
    /// A failed query leaves the previous snapshot in place and marks the
    /// controller unreachable.
    pub async fn query_state(&self) -> Result<Snapshot> {
        let result = self.fetch_state().await;
        let now = self.clock.now();

        let mut status = self.status.lock();

        let state = match result {
            Ok(state) => state,
            Err(e) => {
                if status.reachable {
                    warn!("Controller {} unreachable: {}", self.config.address(), e);
                }
                status.reachable = false;
                return Err(e);
            }
        };

        if let Some(pending) = status.pending_valve {
            if state.valve_open == pending.target_open {
                info!("Valve reached {} position", position(pending.target_open));
                status.pending_valve = None;
            }
        }

        let settling = self.expire_pending(&mut status, now).is_some();
        let snapshot = Snapshot::new(state, Utc::now(), settling);

        if !status.reachable {
            info!("Controller {} reachable", self.config.address());
        }
        status.reachable = true;
        status.last_success = Some(now);
        status.snapshot = Some(snapshot.clone());

        debug!("{}", snapshot);
        Ok(snapshot)
    }

    /// Open or close the valve
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationInProgress`] while a previous valve command is
    /// still settling.
    pub async fn set_valve(&self, open: bool) -> Result<ValveCommand> {
        let _writes = self.writes.lock().await;

        if let Some(remaining) = self.settle_remaining() {
            debug!("Valve command refused, settling for another {:?}", remaining);
            return Err(Error::OperationInProgress { remaining });
        }

        let snapshot = self.query_state().await?;
        let mut control = self.control_from(&snapshot.state);
        control.valve_open = open;
        self.send_control(control).await?;

        self.status.lock().pending_valve = Some(PendingValveOperation {
            requested_at: self.clock.now(),
            target_open: open,
        });

        info!("Valve {} requested", position(open));
        Ok(ValveCommand::Accepted { target_open: open })
    }

    pub async fn set_dry_mode(&self, enabled: bool) -> Result<()> {
        info!("Setting dry mode: {}", enabled);
        self.update_control(|control| control.dry_mode = enabled).await
    }

    pub async fn set_auto_close(&self, enabled: bool) -> Result<()> {
        info!("Setting auto-close: {}", enabled);
        self.update_control(|control| control.auto_close = enabled).await
    }

    /// Switch one wired line between sensor and counter mode
    pub async fn set_line_mode(&self, line: LineId, mode: LineMode) -> Result<()> {
        info!("Setting {} to {} mode", line, mode);
        self.update_control(|control| control.line_modes = control.line_modes.with_mode(line, mode))
            .await
    }

    /// Set the counter value of a line, switching it to counter mode if needed
    pub async fn set_counter(&self, line: LineId, value: u32) -> Result<()> {
        let _writes = self.writes.lock().await;

        let snapshot = self.query_state().await?;

        if snapshot.state.line(line).mode == LineMode::Sensor {
            info!("Switching {} to counter mode", line);
            let mut control = self.control_from(&snapshot.state);
            control.line_modes = control.line_modes.with_mode(line, LineMode::Counter);
            self.send_control(control).await?;
        }

        info!("Setting {} counter to {}", line, value);
        self.dispatcher
            .execute(
                Command::SetCounterValue,
                counter_payload(line, value),
                Command::SetCounterValue,
            )
            .await?;

        Ok(())
    }

    /// Most recent successful snapshot
    pub fn latest_state(&self) -> Option<Snapshot> {
        self.status.lock().snapshot.clone()
    }

    /// Last successful update is younger than `offline_after`
    pub fn is_online(&self) -> bool {
        let now = self.clock.now();
        self.status
            .lock()
            .last_success
            .is_some_and(|at| now.saturating_duration_since(at) < self.config.offline_after)
    }

    /// Last query succeeded
    pub fn is_reachable(&self) -> bool {
        self.status.lock().reachable
    }

    pub fn valve_settling(&self) -> bool {
        self.settle_remaining().is_some()
    }

    /// Time left in the current valve settle window
    pub fn settle_remaining(&self) -> Option<Duration> {
        let now = self.clock.now();
        let mut status = self.status.lock();
        self.expire_pending(&mut status, now)
    }

    /// Release the connection; the next command reconnects
    pub async fn close(&self) -> Result<()> {
        self.dispatcher.close().await
    }

    // Helper methods

    async fn fetch_state(&self) -> Result<DeviceState> {
        let frame = self
            .dispatcher
            .execute(Command::SystemState, Bytes::new(), Command::SystemState)
            .await?;

        let state = decode_frame(&frame)?;
        Ok(state)
    }

    async fn update_control<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut SystemControl) + Send,
    {
        let _writes = self.writes.lock().await;

        let snapshot = self.query_state().await?;
        let mut control = self.control_from(&snapshot.state);
        change(&mut control);

        self.send_control(control).await
    }

    /// Control tuple matching `state`, with a settling valve kept at its target
    fn control_from(&self, state: &DeviceState) -> SystemControl {
        let mut control = SystemControl::from_state(state);

        let now = self.clock.now();
        let mut status = self.status.lock();
        if self.expire_pending(&mut status, now).is_some() {
            if let Some(pending) = status.pending_valve {
                control.valve_open = pending.target_open;
            }
        }

        control
    }

    async fn send_control(&self, control: SystemControl) -> Result<()> {
        debug!("Sending control {:?}", control);

        self.dispatcher
            .execute(Command::SetSystemState, control.payload(), Command::SetSystemState)
            .await?;

        Ok(())
    }

    /// Drop the pending valve operation once its window has passed
    fn expire_pending(&self, status: &mut Status, now: Instant) -> Option<Duration> {
        let pending = status.pending_valve?;
        let elapsed = now.saturating_duration_since(pending.requested_at);

        if elapsed >= self.config.valve_settle_time {
            debug!("Valve settle window elapsed");
            status.pending_valve = None;
            return None;
        }

        Some(self.config.valve_settle_time - elapsed)
    }
}

fn position(open: bool) -> &'static str {
    if open { "open" } else { "closed" }
}
