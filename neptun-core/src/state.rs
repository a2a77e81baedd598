//! System state decoder
//!
//! Turns the 112-byte `SYSTEM_STATE` response into a [`DeviceState`]. Apart
//! from the length check the decoder is total: unrecognised enum bytes come
//! back as `Unknown(raw)` and out-of-range battery bytes are clamped and
//! reported as a [`DecodeWarning`].

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use tracing::{debug, warn};

use neptun_types::{
    DecodeWarning, DeviceInfo, DeviceState, LineCounter, LineModes, SensorReading, SensorState,
    SignalLevel, StatusFlags,
};

use crate::{
    command::Command,
    error::{Error, Result},
    frame::Frame,
    layout::{LineSlot, SensorSlot, TextField, LAYOUT, STATE_BLOCK_SIZE},
};

/// Battery percentage from the signed wire byte
///
/// The controller reports the level as a signed byte whose magnitude is the
/// percentage, so `0xD6` (-42) means 42%. Returns `None` when the magnitude
/// is above 100.
///
/// ```
/// use neptun_core::state::battery_percent;
///
/// assert_eq!(battery_percent(0x64), Some(100));
/// assert_eq!(battery_percent(0xD6), Some(42));
/// assert_eq!(battery_percent(0x80), None);
/// ```
pub fn battery_percent(raw: u8) -> Option<u8> {
    let magnitude = (raw as i8).unsigned_abs();
    (magnitude <= 100).then_some(magnitude)
}

/// Decode a raw system state block
///
/// # Errors
///
/// Returns [`Error::UnexpectedLength`] unless `raw` is exactly
/// [`STATE_BLOCK_SIZE`] bytes.
pub fn decode_state(raw: &[u8]) -> Result<DeviceState> {
    if raw.len() != STATE_BLOCK_SIZE {
        return Err(Error::UnexpectedLength {
            expected: STATE_BLOCK_SIZE,
            actual: raw.len(),
        });
    }

    let layout = &LAYOUT;
    let mut warnings = Vec::new();

    let sensors = std::array::from_fn(|i| {
        decode_sensor(raw, &layout.sensors[i], i + 1, &mut warnings)
    });

    let line_modes = LineModes::from_bits_truncate(raw[layout.line_modes]);
    let modes = line_modes.modes();
    let lines = std::array::from_fn(|i| decode_line(raw, &layout.lines[i], modes[i]));

    let state = DeviceState {
        valve_open: raw[layout.valve] == 0x01,
        dry_mode_enabled: raw[layout.dry_mode] != 0,
        auto_close_enabled: raw[layout.auto_close] != 0,
        sensor_count: raw[layout.sensor_count],
        relay_count: raw[layout.relay_count],
        line_modes,
        status: StatusFlags::from_bits_retain(raw[layout.status]),
        sensors,
        lines,
        info: DeviceInfo::new(
            text(raw, layout.model),
            text(raw, layout.mac_address),
            text(raw, layout.serial_number),
        ),
        warnings,
        raw: Bytes::copy_from_slice(raw),
    };

    for warning in &state.warnings {
        warn!("State block: {}", warning);
    }

    debug!(
        valve_open = state.valve_open,
        dry_mode = state.dry_mode_enabled,
        auto_close = state.auto_close_enabled,
        status = format!("0x{:02X}", state.status.bits()),
        "Decoded system state"
    );

    Ok(state)
}

/// Decode the state carried by a `SYSTEM_STATE` response frame
///
/// The layout offsets count from the start of the frame, so the frame is
/// re-encoded to its wire image before decoding.
pub fn decode_frame(frame: &Frame) -> Result<DeviceState> {
    if frame.command != Command::SystemState {
        return Err(Error::UnknownCommand(frame.command.into()));
    }

    decode_state(&frame.encode())
}

fn decode_sensor(
    raw: &[u8],
    slot: &SensorSlot,
    number: usize,
    warnings: &mut Vec<DecodeWarning>,
) -> SensorReading {
    let battery_raw = raw[slot.battery];
    let battery_percent = battery_percent(battery_raw).unwrap_or_else(|| {
        warnings.push(DecodeWarning::BatteryOutOfRange {
            sensor: number,
            raw: battery_raw,
        });
        100
    });

    SensorReading {
        index: raw[slot.index],
        state: SensorState::from(raw[slot.state]),
        battery_percent,
        battery_raw,
        signal: SignalLevel::from(raw[slot.signal]),
    }
}

fn decode_line(raw: &[u8], slot: &LineSlot, mode: neptun_types::LineMode) -> LineCounter {
    LineCounter {
        mode,
        value: BigEndian::read_u32(&raw[slot.counter..slot.counter + 4]),
        step: raw[slot.step],
    }
}

fn text(raw: &[u8], field: TextField) -> String {
    String::from_utf8_lossy(&raw[field.range()])
        .trim_end_matches('\0')
        .trim()
        .to_string()
}
