//! Payloads for the write commands

use bytes::{BufMut, Bytes, BytesMut};

use neptun_types::{DeviceState, LineId, LineModes};

/// Every write payload starts with this marker
const WRITE_MARKER: [u8; 3] = [0x53, 0x00, 0x04];

/// Full control tuple sent with `SET_SYSTEM_STATE`
///
/// The controller overwrites all four values at once, so callers start from
/// the current state and change one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemControl {
    pub valve_open: bool,
    pub dry_mode: bool,
    pub auto_close: bool,
    pub line_modes: LineModes,
}

impl SystemControl {
    pub const PAYLOAD_SIZE: usize = 7;

    /// Control tuple that leaves the device as `state` describes it
    pub fn from_state(state: &DeviceState) -> Self {
        Self {
            valve_open: state.valve_open,
            dry_mode: state.dry_mode_enabled,
            auto_close: state.auto_close_enabled,
            line_modes: state.line_modes,
        }
    }

    pub fn payload(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::PAYLOAD_SIZE);
        buf.put_slice(&WRITE_MARKER);
        buf.put_u8(self.valve_open.into());
        buf.put_u8(self.dry_mode.into());
        buf.put_u8(self.auto_close.into());
        buf.put_u8(self.line_modes.bits());
        buf.freeze()
    }
}

/// `SET_COUNTER_VALUE` payload for one line
///
/// Unlike the state block, the counter value travels little-endian.
pub fn counter_payload(line: LineId, value: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(11);
    buf.put_slice(&WRITE_MARKER);
    buf.put_u8(line.number());
    buf.put_bytes(0, 3);
    buf.put_u32_le(value);
    buf.freeze()
}
