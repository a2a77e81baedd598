//! Transport layer for the Neptun protocol
//!
//! Provides the TCP link to a controller and the session that paces,
//! reconnects and times out exchanges on top of it.

pub mod clock;
pub mod error;
pub mod session;
pub mod tcp;

pub use clock::{Clock, ManualClock, SharedClock, TokioClock};
pub use error::{Error, Result};
pub use session::Session;
pub use tcp::TcpTransport;

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;

/// Transport trait for different communication methods
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to device
    async fn connect(&mut self) -> Result<()>;

    /// Disconnect from device
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Send raw bytes
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive exactly one frame (with timeout)
    async fn receive(&mut self, timeout: Duration) -> Result<BytesMut>;

    /// Get remote address
    fn remote_addr(&self) -> String;
}
