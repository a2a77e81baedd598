//! Byte layout of the system state block
//!
//! The `SYSTEM_STATE` response is a single 112-byte frame. Every position
//! the decoder reads is declared here, counted from the first preamble byte,
//! so the layout lives in one place and is checked by tests against the
//! fixed block size.
//!
//! ```text
//!  0..6    frame header
//!  9..14   model           ("N4106")
//! 17..34   MAC address     ("60:C5:A8:6F:56:6A")
//! 41..48   system block    valve, sensors, relays, dry, auto-close, line modes, status
//! 51..63   wireless sensors, 4 bytes each: state, index, battery, signal
//! 73..93   line counters,   5 bytes each: value (BE u32), step
//! 96..106  serial number
//! 110..112 CRC
//! ```

use std::ops::Range;

use neptun_types::{LINE_COUNT, SENSOR_COUNT};

/// Size of the `SYSTEM_STATE` response
pub const STATE_BLOCK_SIZE: usize = 112;

/// Byte positions of one wireless sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSlot {
    pub state: usize,
    pub index: usize,

    /// Signed battery byte
    pub battery: usize,
    pub signal: usize,
}

/// Byte positions of one wired line counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSlot {
    /// First byte of the big-endian u32 value
    pub counter: usize,
    pub step: usize,
}

/// Fixed-width ASCII field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextField {
    pub offset: usize,
    pub len: usize,
}

impl TextField {
    pub fn range(self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Positions of every decoded field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    pub valve: usize,
    pub sensor_count: usize,
    pub relay_count: usize,
    pub dry_mode: usize,
    pub auto_close: usize,
    pub line_modes: usize,
    pub status: usize,
    pub sensors: [SensorSlot; SENSOR_COUNT],
    pub lines: [LineSlot; LINE_COUNT],
    pub model: TextField,
    pub mac_address: TextField,
    pub serial_number: TextField,
}

const SENSOR_STRIDE: usize = 4;
const LINE_STRIDE: usize = 5;

const fn sensor(number: usize) -> SensorSlot {
    let base = 51 + (number - 1) * SENSOR_STRIDE;
    SensorSlot {
        state: base,
        index: base + 1,
        battery: base + 2,
        signal: base + 3,
    }
}

const fn line(number: usize) -> LineSlot {
    let base = 73 + (number - 1) * LINE_STRIDE;
    LineSlot {
        counter: base,
        step: base + 4,
    }
}

/// Layout of the N4106 system state block
pub const LAYOUT: StateLayout = StateLayout {
    valve: 41,
    sensor_count: 42,
    relay_count: 43,
    dry_mode: 44,
    auto_close: 45,
    line_modes: 46,
    status: 47,
    sensors: [sensor(1), sensor(2), sensor(3)],
    lines: [line(1), line(2), line(3), line(4)],
    model: TextField { offset: 9, len: 5 },
    mac_address: TextField { offset: 17, len: 17 },
    serial_number: TextField { offset: 96, len: 10 },
};

impl StateLayout {
    /// Every byte range the decoder reads, with a field name
    pub fn fields(&self) -> Vec<(String, Range<usize>)> {
        let single = |name: &str, offset: usize| (name.to_string(), offset..offset + 1);

        let mut fields = vec![
            single("valve", self.valve),
            single("sensor_count", self.sensor_count),
            single("relay_count", self.relay_count),
            single("dry_mode", self.dry_mode),
            single("auto_close", self.auto_close),
            single("line_modes", self.line_modes),
            single("status", self.status),
            ("model".to_string(), self.model.range()),
            ("mac_address".to_string(), self.mac_address.range()),
            ("serial_number".to_string(), self.serial_number.range()),
        ];

        for (i, slot) in self.sensors.iter().enumerate() {
            let n = i + 1;
            fields.push(single(&format!("sensor_{n}_state"), slot.state));
            fields.push(single(&format!("sensor_{n}_index"), slot.index));
            fields.push(single(&format!("sensor_{n}_battery"), slot.battery));
            fields.push(single(&format!("sensor_{n}_signal"), slot.signal));
        }

        for (i, slot) in self.lines.iter().enumerate() {
            let n = i + 1;
            fields.push((format!("line_{n}_counter"), slot.counter..slot.counter + 4));
            fields.push(single(&format!("line_{n}_step"), slot.step));
        }

        fields
    }
}
