//! Transport errors

use std::io;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Connection refused by {0}")]
    ConnectionRefused(String),

    #[error("Connect timeout after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Connection closed by remote")]
    ConnectionClosed,

    /// The link broke during an exchange; the request is not resent
    #[error("Connection lost: {0}")]
    ConnectionLost(Box<Error>),

    /// The current command already lost its connection and used its reconnect
    #[error("Connection lost, reconnect already used for this command")]
    ReconnectSpent,

    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] neptun_core::Error),
}

impl Error {
    /// The established connection broke; a fresh one may work
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, Self::NotConnected | Self::ConnectionClosed | Self::Io(_))
    }

    /// Opening the connection failed
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionRefused(_) | Self::ConnectTimeout(_) | Self::InvalidAddress(_)
        )
    }
}
