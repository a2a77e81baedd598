//! Neptun wire frame structure and encoding/decoding

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    command::{Command, Nak},
    constants::{REQUEST_PREAMBLE, RESPONSE_PREAMBLE},
    error::{Error, Result},
    HEADER_SIZE, MAX_FRAME_SIZE,
};

/// Which side of the link a frame travels from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Host to controller (`02 54 51`)
    Request,

    /// Controller to host (`02 54 41`)
    Response,
}

impl Direction {
    pub fn preamble(self) -> [u8; 3] {
        match self {
            Self::Request => REQUEST_PREAMBLE,
            Self::Response => RESPONSE_PREAMBLE,
        }
    }

    fn from_preamble(bytes: &[u8]) -> Result<Self> {
        let mut preamble = [0u8; 3];
        preamble.copy_from_slice(&bytes[..Frame::PREAMBLE_SIZE]);

        match preamble {
            REQUEST_PREAMBLE => Ok(Self::Request),
            RESPONSE_PREAMBLE => Ok(Self::Response),
            other => Err(Error::BadPreamble(other)),
        }
    }
}

/// Neptun protocol frame
///
/// # Frame Structure
///
/// ```text
/// ┌─────────────┬─────────┬─────────────┬─────────────┬─────────────┐
/// │  Preamble   │ Command │   Length    │   Payload   │    CRC16    │
/// │   3 bytes   │  1 byte │   2 bytes   │   N bytes   │   2 bytes   │
/// │ 02 54 51/41 │         │   (BE u16)  │             │  (BE u16)   │
/// └─────────────┴─────────┴─────────────┴─────────────┴─────────────┘
/// ```
///
/// The CRC covers preamble, command, length and payload.
///
/// # Examples
///
/// ```
/// use neptun_core::{Command, Frame};
///
/// let frame = Frame::request(Command::SystemState, Vec::new()).unwrap();
/// let encoded = frame.encode();
/// assert_eq!(&encoded[..], &[0x02u8, 0x54, 0x51, 0x52, 0x00, 0x00, 0x2A, 0x45]);
///
/// let decoded = Frame::decode(encoded).unwrap();
/// assert_eq!(decoded, frame);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub direction: Direction,

    /// Command code
    pub command: Command,

    /// Frame payload (command-specific data)
    pub payload: Bytes,
}

impl Frame {
    pub const PREAMBLE_SIZE: usize = 3;

    /// Preamble plus command byte; enough to recognise a NAK
    pub const PREFIX_SIZE: usize = 4;

    pub const HEADER_SIZE: usize = HEADER_SIZE;

    pub const CHECKSUM_SIZE: usize = 2;

    /// Size of a frame with an empty payload
    pub const MIN_SIZE: usize = Self::HEADER_SIZE + Self::CHECKSUM_SIZE;

    /// Maximum payload size
    pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - Self::MIN_SIZE;

    /// Create a host-to-controller frame
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPayloadSize`] if the payload exceeds
    /// [`Frame::MAX_PAYLOAD_SIZE`].
    pub fn request(command: Command, payload: impl Into<Bytes>) -> Result<Self> {
        Self::new(Direction::Request, command, payload.into())
    }

    /// Create a controller-to-host frame
    pub fn response(command: Command, payload: impl Into<Bytes>) -> Result<Self> {
        Self::new(Direction::Response, command, payload.into())
    }

    fn new(direction: Direction, command: Command, payload: Bytes) -> Result<Self> {
        if payload.len() > Self::MAX_PAYLOAD_SIZE {
            return Err(Error::InvalidPayloadSize {
                size: payload.len(),
                max: Self::MAX_PAYLOAD_SIZE,
            });
        }

        Ok(Self {
            direction,
            command,
            payload,
        })
    }

    fn put_body(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.direction.preamble());
        buf.put_u8(self.command.into());
        // Bounded by MAX_PAYLOAD_SIZE in the constructors
        buf.put_u16(self.payload.len() as u16);
        buf.put_slice(&self.payload);
    }

    /// Calculate checksum for this frame
    pub fn checksum(&self) -> u16 {
        let mut body = BytesMut::with_capacity(Self::HEADER_SIZE + self.payload.len());
        self.put_body(&mut body);
        checksum::crc16_ccitt(&body)
    }

    /// Encode frame to bytes
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size());

        self.put_body(&mut buf);
        let crc = checksum::crc16_ccitt(&buf);
        buf.put_u16(crc);

        buf
    }

    /// Decode frame from bytes
    ///
    /// # Errors
    ///
    /// Checks are made in wire order:
    /// - [`Error::TooShort`] if the buffer cannot hold a frame
    /// - [`Error::BadPreamble`] if neither preamble matches
    /// - [`Error::DeviceRejected`] if the controller sent a NAK
    /// - [`Error::LengthMismatch`] if the length field disagrees with the buffer
    /// - [`Error::ChecksumMismatch`] if the CRC does not verify
    /// - [`Error::UnknownCommand`] if the command byte is not supported
    pub fn decode(mut buf: BytesMut) -> Result<Self> {
        if buf.len() < Self::PREFIX_SIZE {
            return Err(Error::TooShort {
                expected: Self::MIN_SIZE,
                actual: buf.len(),
            });
        }

        let direction = Direction::from_preamble(&buf)?;

        if direction == Direction::Response {
            if let Some(nak) = Nak::from_code(buf[3]) {
                return Err(Error::DeviceRejected(nak));
            }
        }

        if buf.len() < Self::MIN_SIZE {
            return Err(Error::TooShort {
                expected: Self::MIN_SIZE,
                actual: buf.len(),
            });
        }

        let declared = usize::from(u16::from_be_bytes([buf[4], buf[5]]));
        let actual = buf.len() - Self::MIN_SIZE;
        if declared != actual {
            return Err(Error::LengthMismatch { declared, actual });
        }

        let body_len = buf.len() - Self::CHECKSUM_SIZE;
        let checksum_received = u16::from_be_bytes([buf[body_len], buf[body_len + 1]]);
        let checksum_calculated = checksum::crc16_ccitt(&buf[..body_len]);
        if checksum_calculated != checksum_received {
            return Err(Error::ChecksumMismatch {
                expected: checksum_calculated,
                received: checksum_received,
            });
        }

        let command = Command::try_from(buf[3])?;

        buf.advance(Self::HEADER_SIZE);
        buf.truncate(declared);

        Ok(Self {
            direction,
            command,
            payload: buf.freeze(),
        })
    }

    /// Check if this frame came from the controller
    pub fn is_response(&self) -> bool {
        self.direction == Direction::Response
    }

    /// Get total frame size
    pub fn size(&self) -> usize {
        Self::MIN_SIZE + self.payload.len()
    }
}

/// Encode a request frame for `command`
pub fn encode(command: Command, payload: &[u8]) -> Result<BytesMut> {
    Frame::request(command, Bytes::copy_from_slice(payload)).map(|frame| frame.encode())
}

/// Decode and validate a frame
pub fn decode(buf: &[u8]) -> Result<Frame> {
    Frame::decode(BytesMut::from(buf))
}

/// NAK code carried by a frame prefix, if any
///
/// Only meaningful for the first [`Frame::PREFIX_SIZE`] bytes of a response.
pub fn nak_code(prefix: &[u8]) -> Option<Nak> {
    if prefix.len() < Frame::PREFIX_SIZE || prefix[..Frame::PREAMBLE_SIZE] != RESPONSE_PREAMBLE {
        return None;
    }

    Nak::from_code(prefix[3])
}

/// Total frame length announced by a frame header
///
/// Lets a reader pull exactly one frame off a stream.
pub fn frame_len(header: &[u8]) -> Result<usize> {
    if header.len() < Frame::HEADER_SIZE {
        return Err(Error::TooShort {
            expected: Frame::HEADER_SIZE,
            actual: header.len(),
        });
    }

    Direction::from_preamble(header)?;

    let declared = usize::from(u16::from_be_bytes([header[4], header[5]]));
    if declared > Frame::MAX_PAYLOAD_SIZE {
        return Err(Error::FrameTooLarge {
            declared,
            max: Frame::MAX_PAYLOAD_SIZE,
        });
    }

    Ok(Frame::MIN_SIZE + declared)
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("direction", &self.direction)
            .field("command", &self.command)
            .field("checksum", &format!("0x{:04X}", self.checksum()))
            .field("payload", &hex::encode_upper(&self.payload))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame[{}]({:?}, len={})",
            self.command,
            self.direction,
            self.payload.len()
        )
    }
}
