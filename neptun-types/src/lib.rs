//! Type definitions for neptun

pub mod device_info;
pub mod device_state;
pub mod error;

pub use device_info::DeviceInfo;
pub use device_state::{
    DecodeWarning, DeviceState, LineCounter, LineId, LineMode, LineModes, SensorReading,
    SensorState, SignalLevel, StatusFlags, LINE_COUNT, SENSOR_COUNT,
};
pub use error::{Error, Result};
