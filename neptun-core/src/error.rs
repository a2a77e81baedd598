//! Error types for neptun-core

use crate::command::Nak;

/// Result type alias for neptun-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame is too short to be valid
    #[error("Frame too short: expected at least {expected} bytes, got {actual} bytes")]
    TooShort {
        expected: usize,
        actual: usize,
    },

    /// Frame does not start with a known preamble
    #[error("Bad frame preamble: {0:02X?}")]
    BadPreamble([u8; 3]),

    /// Controller answered with a negative acknowledgement
    #[error("Device rejected command: {0}")]
    DeviceRejected(Nak),

    /// Declared payload length disagrees with the bytes received
    #[error("Frame length mismatch: header declares {declared} payload bytes, frame carries {actual}")]
    LengthMismatch {
        declared: usize,
        actual: usize,
    },

    /// Declared payload length exceeds what the protocol allows
    #[error("Frame too large: header declares {declared} payload bytes (max: {max})")]
    FrameTooLarge {
        declared: usize,
        max: usize,
    },

    /// Checksum verification failed
    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch {
        expected: u16,
        received: u16,
    },

    /// Unknown command code
    #[error("Unknown command code: 0x{0:02X}")]
    UnknownCommand(u8),

    /// Payload too large to encode
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    InvalidPayloadSize {
        size: usize,
        max: usize,
    },

    /// System state block has the wrong size
    #[error("Unexpected state block length: expected {expected} bytes, got {actual} bytes")]
    UnexpectedLength {
        expected: usize,
        actual: usize,
    },
}

impl Error {
    /// Check if error comes from a damaged frame (resending might succeed)
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TooShort { .. }
            | Self::BadPreamble(_)
            | Self::LengthMismatch { .. }
            | Self::FrameTooLarge { .. }
            | Self::ChecksumMismatch { .. } => true,
            Self::DeviceRejected(nak) => nak.is_transient(),
            Self::UnknownCommand(_)
            | Self::InvalidPayloadSize { .. }
            | Self::UnexpectedLength { .. } => false,
        }
    }
}
