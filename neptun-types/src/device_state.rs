//! Decoded system state
//!
//! Everything here is produced by the state decoder in `neptun-core` from a
//! single 112-byte response block. Values are plain data: a new
//! [`DeviceState`] is built for every successful query and never patched in
//! place.

use std::fmt;

use bitflags::bitflags;
use bytes::Bytes;

use crate::device_info::DeviceInfo;
use crate::error::{Error, Result};

/// Number of wireless sensor slots reported by the controller
pub const SENSOR_COUNT: usize = 3;

/// Number of wired input lines
pub const LINE_COUNT: usize = 4;

/// Wireless sensor connection/trigger state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorState {
    /// No sensor paired or sensor not reporting (`0x00`)
    Disconnected,

    /// Leak detected (`0x02`)
    Triggered,

    /// Dry and reporting (`0x03`)
    Normal,

    /// Any other byte, kept so garbled data is distinguishable from "no data"
    Unknown(u8),
}

impl SensorState {
    pub fn is_triggered(self) -> bool {
        matches!(self, Self::Triggered)
    }
}

impl From<u8> for SensorState {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Disconnected,
            0x02 => Self::Triggered,
            0x03 => Self::Normal,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Triggered => f.write_str("triggered"),
            Self::Normal => f.write_str("normal"),
            Self::Unknown(raw) => write!(f, "unknown(0x{raw:02X})"),
        }
    }
}

/// Radio signal level of a wireless sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalLevel {
    TwoOfFour,
    ThreeOfFour,
    Unknown(u8),
}

impl SignalLevel {
    /// Signal bars out of four, if known
    pub fn bars(self) -> Option<u8> {
        match self {
            Self::TwoOfFour => Some(2),
            Self::ThreeOfFour => Some(3),
            Self::Unknown(_) => None,
        }
    }
}

impl From<u8> for SignalLevel {
    fn from(value: u8) -> Self {
        match value {
            0x02 => Self::TwoOfFour,
            0x03 => Self::ThreeOfFour,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for SignalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bars() {
            Some(bars) => write!(f, "{bars}/4"),
            None => f.write_str("unknown"),
        }
    }
}

/// One wireless sensor slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorReading {
    /// Slot index reported by the device
    pub index: u8,

    pub state: SensorState,

    /// Battery level in percent, always within `0..=100`
    pub battery_percent: u8,

    /// Battery byte as received (signed on the wire)
    pub battery_raw: u8,

    pub signal: SignalLevel,
}

/// Operating mode of a wired line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineMode {
    /// Line acts as a wired leak sensor
    Sensor,

    /// Line counts pulses from a water meter
    Counter,
}

impl fmt::Display for LineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor => f.write_str("sensor"),
            Self::Counter => f.write_str("counter"),
        }
    }
}

/// Wired line number, `1..=4` as printed on the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(u8);

impl LineId {
    pub fn new(number: u8) -> Result<Self> {
        if (1..=LINE_COUNT as u8).contains(&number) {
            Ok(Self(number))
        } else {
            Err(Error::InvalidLine(number))
        }
    }

    /// All four lines in order
    pub fn all() -> impl Iterator<Item = LineId> {
        (1..=LINE_COUNT as u8).map(LineId)
    }

    /// Line number as used on the wire (1-based)
    pub fn number(self) -> u8 {
        self.0
    }

    /// Zero-based position in [`DeviceState::lines`]
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl TryFrom<u8> for LineId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}", self.0)
    }
}

bitflags! {
    /// Per-line mode mask; a set bit puts the line in counter mode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LineModes: u8 {
        const LINE_1 = 0x01;
        const LINE_2 = 0x02;
        const LINE_3 = 0x04;
        const LINE_4 = 0x08;
    }
}

impl LineModes {
    fn bit(line: LineId) -> Self {
        Self::from_bits_retain(1 << line.index())
    }

    pub fn mode(self, line: LineId) -> LineMode {
        self.modes()[line.index()]
    }

    /// Mode of every line, indexed like [`DeviceState::lines`]
    pub fn modes(self) -> [LineMode; LINE_COUNT] {
        std::array::from_fn(|index| {
            if self.bits() & (1 << index) != 0 {
                LineMode::Counter
            } else {
                LineMode::Sensor
            }
        })
    }

    /// Copy of `self` with only `line` changed
    pub fn with_mode(self, line: LineId, mode: LineMode) -> Self {
        let mut modes = self;
        modes.set(Self::bit(line), mode == LineMode::Counter);
        modes
    }
}

bitflags! {
    /// Controller status byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StatusFlags: u8 {
        const ALARM = 0x01;
        const MAIN_BATTERY_LOW = 0x02;
        const SENSOR_BATTERY_LOW = 0x04;
        const SENSOR_LOST = 0x08;
    }
}

/// One wired line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCounter {
    pub mode: LineMode,

    /// Counter value (meaningful in counter mode)
    pub value: u32,

    /// Counter increment per pulse
    pub step: u8,
}

/// Non-fatal problems found while decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeWarning {
    /// Battery magnitude above 100; the reading was clamped
    BatteryOutOfRange { sensor: usize, raw: u8 },
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BatteryOutOfRange { sensor, raw } => write!(
                f,
                "sensor {sensor}: battery byte 0x{raw:02X} out of range, clamped to 100%"
            ),
        }
    }
}

/// Complete device snapshot decoded from one system state response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    pub valve_open: bool,
    pub dry_mode_enabled: bool,
    pub auto_close_enabled: bool,

    /// Paired wireless sensors as counted by the controller
    pub sensor_count: u8,
    pub relay_count: u8,

    pub line_modes: LineModes,
    pub status: StatusFlags,
    pub sensors: [SensorReading; SENSOR_COUNT],
    pub lines: [LineCounter; LINE_COUNT],
    pub info: DeviceInfo,
    pub warnings: Vec<DecodeWarning>,

    /// The 112-byte block this state was decoded from
    pub raw: Bytes,
}

impl DeviceState {
    /// Sensor by its 1-based number
    pub fn sensor(&self, number: usize) -> Result<&SensorReading> {
        number
            .checked_sub(1)
            .and_then(|index| self.sensors.get(index))
            .ok_or(Error::InvalidSensor(number))
    }

    pub fn line(&self, line: LineId) -> &LineCounter {
        &self.lines[line.index()]
    }

    /// 1-based numbers of sensors currently reporting a leak
    pub fn triggered_sensors(&self) -> impl Iterator<Item = usize> + '_ {
        self.sensors
            .iter()
            .enumerate()
            .filter(|(_, sensor)| sensor.state.is_triggered())
            .map(|(index, _)| index + 1)
    }

    pub fn any_sensor_triggered(&self) -> bool {
        self.triggered_sensors().next().is_some()
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "State[valve: {}, dry: {}, auto-close: {}, sensors: {}/{}/{}]",
            if self.valve_open { "open" } else { "closed" },
            self.dry_mode_enabled,
            self.auto_close_enabled,
            self.sensors[0].state,
            self.sensors[1].state,
            self.sensors[2].state,
        )
    }
}
