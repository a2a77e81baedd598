//! Neptun protocol command definitions

use std::fmt;

use crate::error::{Error, Result};

/// Protocol command codes
///
/// The controller answers every command with a frame carrying the same code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Read device info and system state (112-byte response)
    SystemState = 0x52,

    /// Write valve, dry mode, auto-close and line modes
    SetSystemState = 0x57,

    /// Write the counter value of one wired line
    SetCounterValue = 0x58,
}

impl Command {
    /// Command code the controller answers with
    pub fn response(self) -> Command {
        self
    }

    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::SystemState => "SYSTEM_STATE",
            Self::SetSystemState => "SET_SYSTEM_STATE",
            Self::SetCounterValue => "SET_COUNTER_VALUE",
        }
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x52 => Ok(Self::SystemState),
            0x57 => Ok(Self::SetSystemState),
            0x58 => Ok(Self::SetCounterValue),
            _ => Err(Error::UnknownCommand(value)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

/// Negative acknowledgement sent in place of a response
///
/// A NAK is the response preamble followed by one of these codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Nak {
    /// The controller did not recognise the command
    UnknownCommand = 0xFB,

    /// The controller saw a bad checksum or malformed request
    ChecksumError = 0xFE,
}

impl Nak {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0xFB => Some(Self::UnknownCommand),
            0xFE => Some(Self::ChecksumError),
            _ => None,
        }
    }

    /// A checksum NAK means the request was damaged in transit
    pub fn is_transient(self) -> bool {
        matches!(self, Self::ChecksumError)
    }
}

impl fmt::Display for Nak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand => write!(f, "unknown command (0x{:02X})", *self as u8),
            Self::ChecksumError => write!(f, "checksum error (0x{:02X})", *self as u8),
        }
    }
}
