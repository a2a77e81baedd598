//! # neptun
//!
//! Client for Neptun leak protection controllers.
//!
//! ## Features
//!
//! - Typed system state: valve, modes, wireless sensors, wired line counters
//! - Async/await API using Tokio
//! - Bounded retries with reconnect, command spacing and valve settle lock
//! - Optional background polling
//!
//! ## Quick Start
//!
//! ```no_run
//! use neptun::{Config, Device};
//!
//! #[tokio::main]
//! async fn main() -> neptun::Result<()> {
//!     let device = Device::new(Config::new("192.168.1.30"));
//!
//!     // Read the current state
//!     let snapshot = device.query_state().await?;
//!     println!("{}", snapshot.state.info);
//!
//!     for sensor in &snapshot.state.sensors {
//!         println!("sensor {}: {} ({}%)", sensor.index, sensor.state, sensor.battery_percent);
//!     }
//!
//!     device.close().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod poller;
pub mod snapshot;

#[cfg(test)]
mod testing;

// Re-exports
pub use config::Config;
pub use device::{Device, PendingValveOperation, ValveCommand};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use poller::{PollStatus, Poller};
pub use snapshot::Snapshot;

// Re-export types
pub use neptun_core::{Command, Frame, Nak};
pub use neptun_transport::{Clock, ManualClock, TcpTransport, TokioClock, Transport};
pub use neptun_types::{
    DeviceInfo, DeviceState, LineId, LineMode, LineModes, SensorReading, SensorState, SignalLevel,
    StatusFlags,
};
