//! Controller connection settings
//!
//! Defaults come from `neptun_core::constants`; override them with the
//! `with_*` methods.

use std::time::Duration;

use neptun_core::{
    constants::{
        DEFAULT_COMMAND_SPACING, DEFAULT_CONNECT_TIMEOUT, DEFAULT_POLL_INTERVAL,
        DEFAULT_RESPONSE_TIMEOUT, MAX_ATTEMPTS, MIN_POLL_INTERVAL, OFFLINE_AFTER, RETRY_DELAY,
        VALVE_SETTLE_TIME,
    },
    DEFAULT_PORT,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network
    // -------------------------------------------------------------------------
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,

    /// Time to wait for one complete response frame
    pub response_timeout: Duration,

    /// Minimum gap between two commands
    pub command_spacing: Duration,

    /// Keep the socket open between commands
    pub keep_alive: bool,

    // -------------------------------------------------------------------------
    // Retries
    // -------------------------------------------------------------------------
    /// Send/receive cycles per command, at least 1
    pub max_attempts: usize,
    pub retry_delay: Duration,

    // -------------------------------------------------------------------------
    // Controller behaviour
    // -------------------------------------------------------------------------
    /// Valve commands are refused for this long after one is accepted
    pub valve_settle_time: Duration,
    pub poll_interval: Duration,

    /// No successful update for this long means offline
    pub offline_after: Duration,
}

impl Config {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            command_spacing: DEFAULT_COMMAND_SPACING,
            keep_alive: true,
            max_attempts: MAX_ATTEMPTS,
            retry_delay: RETRY_DELAY,
            valve_settle_time: VALVE_SETTLE_TIME,
            poll_interval: DEFAULT_POLL_INTERVAL,
            offline_after: OFFLINE_AFTER,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_command_spacing(mut self, spacing: Duration) -> Self {
        self.command_spacing = spacing;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Set attempts per command (values below 1 are raised to 1)
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_valve_settle_time(mut self, settle: Duration) -> Self {
        self.valve_settle_time = settle;
        self
    }

    /// Raised to [`MIN_POLL_INTERVAL`] if shorter
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_offline_after(mut self, after: Duration) -> Self {
        self.offline_after = after;
        self
    }

    /// `host:port` as passed to the transport
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
