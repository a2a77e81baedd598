//! # neptun-core
//!
//! Core protocol implementation for Neptun leak protection controllers.
//!
//! This crate provides the low-level protocol primitives:
//! - Frame structure and encoding/decoding
//! - CRC16-CCITT checksum
//! - Command definitions and write-command payloads
//! - System state block layout and decoder

pub mod checksum;
pub mod command;
pub mod constants;
pub mod control;
pub mod error;
pub mod frame;
pub mod layout;
pub mod state;

pub use command::{Command, Nak};
pub use control::{counter_payload, SystemControl};
pub use error::{Error, Result};
pub use frame::{Direction, Frame};
pub use state::{decode_frame, decode_state};

/// Default controller port
pub const DEFAULT_PORT: u16 = 6350;

/// Maximum frame size accepted on the wire
pub const MAX_FRAME_SIZE: usize = 1024;

/// Frame header size (preamble, command, length)
pub const HEADER_SIZE: usize = 6;
