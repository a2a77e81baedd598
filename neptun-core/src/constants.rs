//! Protocol constants

use std::time::Duration;

/// Preamble of frames sent to the controller
pub const REQUEST_PREAMBLE: [u8; 3] = [0x02, 0x54, 0x51];

/// Preamble of frames sent by the controller
pub const RESPONSE_PREAMBLE: [u8; 3] = [0x02, 0x54, 0x41];

/// Default connection timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default time to wait for a complete response
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(20);

/// Minimum gap between two commands on the same link
pub const DEFAULT_COMMAND_SPACING: Duration = Duration::from_millis(500);

/// Send/receive cycles per command before giving up
pub const MAX_ATTEMPTS: usize = 3;

/// Delay between two attempts of the same command
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Time the valve drive needs before the reported position can be trusted
pub const VALVE_SETTLE_TIME: Duration = Duration::from_secs(15);

/// Default state polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(120);

/// Shortest accepted polling interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A device with no successful update for this long is reported offline
pub const OFFLINE_AFTER: Duration = Duration::from_secs(600);
